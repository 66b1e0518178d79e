//! Headless-browser scraping of merchant hero images.
//!
//! One shared browser process per [`BrowserSession`]; every scrape opens its
//! own page and closes it when done.

pub mod error;
pub mod overlay;
pub mod poll;
pub mod scrape;
pub mod scripts;
pub mod session;

pub use error::BrowserError;
pub use overlay::{dismiss_overlays, OverlayMode};
pub use poll::poll_until;
pub use scrape::{pick_option, BrowserScraper, ScrapeOutcome, ScrapeTiming};
pub use session::{BrowserSession, PageLease, SessionOptions};
