use thiserror::Error;

use cardfill_browser::BrowserError;

/// Hard lookup failure.
///
/// `Clone` so one failure can be handed to every caller that joined the
/// same in-flight resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("browser unavailable: {0}")]
    Browser(String),

    #[error("lookup task failed: {0}")]
    Task(String),
}

impl From<BrowserError> for LookupError {
    fn from(err: BrowserError) -> Self {
        Self::Browser(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LookupError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
