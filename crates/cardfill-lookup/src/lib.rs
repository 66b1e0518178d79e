//! Merchant resolution with caching and in-flight request collapsing.

pub mod cache;
pub mod error;
pub mod mock;
pub mod resolver;
pub mod service;

pub use cache::{Clock, Coordinator, ManualClock, SystemClock};
pub use error::LookupError;
pub use mock::build_mock;
pub use resolver::{HeroScraper, MerchantDirectory, MerchantResolver};
pub use service::{build_live_service, LiveLookupService, LookupService};
