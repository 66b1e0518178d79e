use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub use_mock: bool,
    pub debug: bool,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub public_base_url: String,
    pub api_base_url: String,
    pub site_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub cache_ttl_secs: u64,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub max_pages: usize,
    pub batch_concurrency: usize,
}

impl AppConfig {
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// `DEBUG` raises only this workspace's crates so dependency noise stays
    /// at the configured level.
    #[must_use]
    pub fn log_directive(&self) -> String {
        if self.debug {
            format!(
                "{},cardfill_core=debug,cardfill_scraper=debug,cardfill_browser=debug,cardfill_lookup=debug,cardfill_server=debug,cardfill_cli=debug",
                self.log_level
            )
        } else {
            self.log_level.clone()
        }
    }
}
