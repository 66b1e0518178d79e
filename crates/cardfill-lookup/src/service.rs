use std::sync::Arc;

use cardfill_browser::{BrowserScraper, BrowserSession};
use cardfill_core::{AppConfig, LookupQuery, MerchantRecord};
use cardfill_scraper::{MarketplaceClient, ScraperError};

use crate::cache::Coordinator;
use crate::error::LookupError;
use crate::resolver::{HeroScraper, MerchantDirectory, MerchantResolver};

/// Cached, de-duplicated merchant lookups.
pub struct LookupService<D, H> {
    resolver: Arc<MerchantResolver<D, H>>,
    cache: Coordinator<MerchantRecord, LookupError>,
}

pub type LiveLookupService = LookupService<MarketplaceClient, BrowserScraper>;

impl<D: MerchantDirectory, H: HeroScraper> LookupService<D, H> {
    #[must_use]
    pub fn new(
        resolver: MerchantResolver<D, H>,
        cache: Coordinator<MerchantRecord, LookupError>,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            cache,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &MerchantResolver<D, H> {
        &self.resolver
    }

    /// Resolves `query`, serving fresh cache entries and joining any lookup
    /// already running for the same normalized name.
    ///
    /// # Errors
    ///
    /// See [`MerchantResolver::lookup_merchant`].
    pub async fn lookup(&self, query: &LookupQuery) -> Result<MerchantRecord, LookupError> {
        let resolver = Arc::clone(&self.resolver);
        let owned = query.clone();
        self.cache
            .get_or_compute(&query.cache_key(), move || async move {
                resolver.lookup_merchant(&owned).await
            })
            .await
    }

    pub async fn clear_cache(&self) -> usize {
        let cleared = self.cache.clear().await;
        tracing::info!(cleared, "cache cleared");
        cleared
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.len().await
    }

    pub async fn in_flight(&self) -> usize {
        self.cache.in_flight().await
    }
}

/// Wires the production service from configuration.
///
/// The browser session is returned separately so the caller can shut it down;
/// it is not launched until a scrape needs it.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
pub fn build_live_service(
    config: &AppConfig,
) -> Result<(LiveLookupService, Arc<BrowserSession>), ScraperError> {
    let client = MarketplaceClient::new(
        &config.api_base_url,
        &config.site_base_url,
        config.request_timeout_secs,
        &config.user_agent,
    )?;
    let session = Arc::new(BrowserSession::from_config(config));
    let scraper = BrowserScraper::new(Arc::clone(&session), &config.site_base_url);
    let resolver = MerchantResolver::new(client, scraper, config.use_mock);
    let service = LookupService::new(resolver, Coordinator::new(config.cache_ttl()));
    Ok((service, session))
}
