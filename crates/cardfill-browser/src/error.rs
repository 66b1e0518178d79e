use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("invalid browser configuration: {0}")]
    Config(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("browser session has been shut down")]
    Closed,
}

impl BrowserError {
    /// Whether the failure means no scrape can run at all, as opposed to a
    /// single page misbehaving.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Cdp(_))
    }
}
