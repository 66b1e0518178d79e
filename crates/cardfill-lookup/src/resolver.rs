//! Multi-strategy merchant resolution.
//!
//! Order of attempts for a query:
//!
//! 1. Mock mode: synthesize a placeholder and stop.
//! 2. JSON search, ranked by [`cardfill_scraper::best_candidate`]. Failure
//!    or no viable candidate skips to step 5 with the raw query.
//! 3. Details JSON for the candidate's key. A hero that passes the asset
//!    check is returned without touching the browser.
//! 4. Browser scrape of the details page by key.
//! 5. Browser scrape through the site's search autocomplete, merged with
//!    whatever name/logo step 2 found.
//!
//! Steps 4 and 5 can disagree; step 5 runs only when step 4 yields no valid
//! hero. Its hero passes the same asset check; a rejected one becomes the
//! record's `error`. This ordering is a heuristic, not a guarantee that the
//! two paths agree.

use std::future::Future;

use serde_json::Value;

use cardfill_browser::{BrowserError, BrowserScraper, ScrapeOutcome};
use cardfill_core::{LookupQuery, MerchantCandidate, MerchantRecord};
use cardfill_scraper::{
    best_candidate, is_hero_asset_url, MarketplaceClient, MerchantDetails, ScraperError,
};

use crate::error::LookupError;
use crate::mock::build_mock;

/// The marketplace's JSON endpoints.
pub trait MerchantDirectory: Send + Sync + 'static {
    fn search(&self, query: &str) -> impl Future<Output = Result<Value, ScraperError>> + Send;

    fn details(
        &self,
        merchant_key: &str,
    ) -> impl Future<Output = Result<MerchantDetails, ScraperError>> + Send;
}

impl MerchantDirectory for MarketplaceClient {
    async fn search(&self, query: &str) -> Result<Value, ScraperError> {
        self.search_merchants(query).await
    }

    async fn details(&self, merchant_key: &str) -> Result<MerchantDetails, ScraperError> {
        self.merchant_details(merchant_key).await
    }
}

/// Browser-driven hero extraction.
pub trait HeroScraper: Send + Sync + 'static {
    fn scrape_by_key(
        &self,
        merchant_key: &str,
        merchant_name: Option<&str>,
    ) -> impl Future<Output = Result<ScrapeOutcome, BrowserError>> + Send;

    fn scrape_by_search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<ScrapeOutcome, BrowserError>> + Send;
}

impl HeroScraper for BrowserScraper {
    async fn scrape_by_key(
        &self,
        merchant_key: &str,
        merchant_name: Option<&str>,
    ) -> Result<ScrapeOutcome, BrowserError> {
        BrowserScraper::scrape_by_key(self, merchant_key, merchant_name).await
    }

    async fn scrape_by_search(&self, query: &str) -> Result<ScrapeOutcome, BrowserError> {
        BrowserScraper::scrape_by_search(self, query).await
    }
}

#[derive(Debug)]
pub struct MerchantResolver<D, H> {
    directory: D,
    scraper: H,
    use_mock: bool,
}

impl<D: MerchantDirectory, H: HeroScraper> MerchantResolver<D, H> {
    #[must_use]
    pub fn new(directory: D, scraper: H, use_mock: bool) -> Self {
        Self {
            directory,
            scraper,
            use_mock,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    #[must_use]
    pub fn scraper(&self) -> &H {
        &self.scraper
    }

    /// Resolves `query` into a best-effort merchant record.
    ///
    /// Scrape shortfalls are reported in the record's `error` field rather
    /// than as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Browser`] when the browser cannot be launched.
    pub async fn lookup_merchant(&self, query: &LookupQuery) -> Result<MerchantRecord, LookupError> {
        if self.use_mock {
            return Ok(build_mock(query));
        }

        tracing::debug!(%query, "resolving merchant");
        let candidate = self.search_candidate(query).await.unwrap_or_default();
        let MerchantCandidate {
            name: candidate_name,
            mut logo_url,
            merchant_key,
            subtitle,
            ..
        } = candidate;

        if let Some(key) = merchant_key.as_deref() {
            match self.directory.details(key).await {
                Ok(details) => {
                    if details.icon_image_url.is_some() {
                        logo_url = details.icon_image_url;
                    }
                    if let Some(hero) = details.hero_image_url.filter(|u| is_hero_asset_url(u)) {
                        tracing::debug!(%query, key, "hero found in details JSON");
                        return Ok(MerchantRecord {
                            name: candidate_name.or(details.name),
                            logo_url,
                            hero_url: Some(hero),
                            merchant_key,
                            subtitle,
                            error: None,
                        });
                    }
                }
                Err(e) => tracing::debug!(%query, key, error = %e, "details lookup failed"),
            }

            let outcome = self
                .scraper
                .scrape_by_key(key, candidate_name.as_deref())
                .await?;
            if let Some(hero) = valid_hero(&outcome) {
                return Ok(MerchantRecord {
                    name: outcome.name.or(candidate_name),
                    logo_url,
                    hero_url: Some(hero),
                    merchant_key,
                    subtitle,
                    error: None,
                });
            }
            tracing::debug!(%query, key, error = ?outcome.error, "key scrape fell short, trying site search");
        }

        let search_name = candidate_name
            .clone()
            .unwrap_or_else(|| query.as_str().to_string());
        let outcome = screen_search_hero(self.scraper.scrape_by_search(&search_name).await?);
        if let Some(error) = &outcome.error {
            tracing::warn!(%query, error, "hero scrape failed, returning partial record");
        }

        Ok(MerchantRecord {
            name: outcome
                .name
                .or(candidate_name)
                .or_else(|| Some(query.as_str().to_string())),
            logo_url,
            hero_url: outcome.hero_url,
            merchant_key,
            subtitle,
            error: outcome.error,
        })
    }

    async fn search_candidate(&self, query: &LookupQuery) -> Option<MerchantCandidate> {
        match self.directory.search(query.as_str()).await {
            Ok(payload) => {
                let best = best_candidate(&payload, query.as_str());
                if best.is_none() {
                    tracing::debug!(%query, "search returned no viable candidate");
                }
                best
            }
            Err(e) => {
                tracing::debug!(%query, error = %e, "search failed, falling back to site search");
                None
            }
        }
    }
}

fn valid_hero(outcome: &ScrapeOutcome) -> Option<String> {
    if outcome.error.is_some() {
        return None;
    }
    outcome
        .hero_url
        .as_deref()
        .filter(|u| is_hero_asset_url(u))
        .map(str::to_string)
}

/// Drops a search-path hero that fails the asset check, recording why.
fn screen_search_hero(outcome: ScrapeOutcome) -> ScrapeOutcome {
    let ScrapeOutcome {
        hero_url,
        name,
        error,
    } = outcome;
    match hero_url {
        Some(url) if !is_hero_asset_url(&url) => {
            tracing::debug!(%url, "search hero rejected by asset filter");
            ScrapeOutcome {
                hero_url: None,
                name,
                error: error.or_else(|| Some(format!("hero image rejected by asset filter: {url}"))),
            }
        }
        hero_url => ScrapeOutcome {
            hero_url,
            name,
            error,
        },
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
