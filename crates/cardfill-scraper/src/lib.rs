pub mod assets;
pub mod candidates;
pub mod client;
pub mod error;
pub mod types;

pub use assets::{is_hero_asset_url, pick_best_asset, score_hero_url};
pub use candidates::{best_candidate, extract_candidates};
pub use client::MarketplaceClient;
pub use error::ScraperError;
pub use types::MerchantDetails;
