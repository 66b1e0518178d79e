//! The two hero-image scrape strategies.
//!
//! Both share one procedure: open a page, record every asset-like image
//! request, navigate, dismiss overlays, poll the DOM for a hero image, and
//! fall back to the best recorded request. Any step failing turns into a
//! [`ScrapeOutcome`] with `error` set; only a browser that cannot be
//! launched is an `Err`.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use cardfill_core::encode_component;
use cardfill_scraper::{is_hero_asset_url, pick_best_asset};

use crate::error::BrowserError;
use crate::overlay::{dismiss_overlays, OverlayMode};
use crate::poll::poll_until;
use crate::scripts::{
    autocomplete_options_script, click_nth_visible_script, first_visible_selector_script,
    heading_script, hero_image_script, SEARCH_INPUT_SELECTORS,
};
use crate::session::{BrowserSession, PageLease};

/// Result of one scrape attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub hero_url: Option<String>,
    pub name: Option<String>,
    pub error: Option<String>,
}

impl ScrapeOutcome {
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            hero_url: None,
            name: None,
            error: Some(reason.into()),
        }
    }

    fn found(hero_url: Option<String>, name: Option<String>) -> Self {
        let error = hero_url
            .is_none()
            .then(|| "no hero image found".to_string());
        Self {
            hero_url,
            name,
            error,
        }
    }
}

/// Waits and deadlines used by the scrapers.
#[derive(Debug, Clone)]
pub struct ScrapeTiming {
    pub navigation_timeout: Duration,
    pub poll_interval: Duration,
    pub hero_deadline: Duration,
    pub search_input_deadline: Duration,
    pub autocomplete_deadline: Duration,
    pub keystroke_delay: Duration,
    pub autocomplete_settle: Duration,
    pub overlay_settle: Duration,
}

impl Default for ScrapeTiming {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            hero_deadline: Duration::from_secs(10),
            search_input_deadline: Duration::from_secs(10),
            autocomplete_deadline: Duration::from_secs(8),
            keystroke_delay: Duration::from_millis(60),
            autocomplete_settle: Duration::from_millis(800),
            overlay_settle: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AutocompleteOptions {
    selector: String,
    texts: Vec<String>,
}

/// Picks the autocomplete option to click: an exact case-insensitive match,
/// else the first option containing the query, else the first option.
#[must_use]
pub fn pick_option(options: &[String], query: &str) -> Option<usize> {
    if options.is_empty() {
        return None;
    }
    let query = query.trim().to_lowercase();
    let normalized: Vec<String> = options.iter().map(|o| o.trim().to_lowercase()).collect();

    normalized
        .iter()
        .position(|o| *o == query)
        .or_else(|| {
            (!query.is_empty())
                .then(|| normalized.iter().position(|o| o.contains(&query)))
                .flatten()
        })
        .or(Some(0))
}

/// Collects asset-like request URLs seen by a page, in request order.
struct AssetRecorder {
    urls: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl AssetRecorder {
    async fn attach(page: &Page) -> Result<Self, BrowserError> {
        let mut events = page.event_listener::<EventRequestWillBeSent>().await?;
        let urls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&urls);
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                record_asset(&mut *sink.lock().await, &event.request.url);
            }
        });
        Ok(Self { urls, task })
    }

    async fn snapshot(&self) -> Vec<String> {
        self.urls.lock().await.clone()
    }
}

impl Drop for AssetRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn record_asset(urls: &mut Vec<String>, url: &str) {
    if is_hero_asset_url(url) && !urls.iter().any(|u| u == url) {
        urls.push(url.to_string());
    }
}

/// Scrapes hero images through a shared [`BrowserSession`].
#[derive(Debug, Clone)]
pub struct BrowserScraper {
    session: Arc<BrowserSession>,
    site_base_url: String,
    timing: ScrapeTiming,
}

impl BrowserScraper {
    #[must_use]
    pub fn new(session: Arc<BrowserSession>, site_base_url: &str) -> Self {
        Self {
            session,
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
            timing: ScrapeTiming::default(),
        }
    }

    #[must_use]
    pub fn with_timing(mut self, timing: ScrapeTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    #[must_use]
    pub fn details_page_url(&self, merchant_key: &str) -> String {
        format!(
            "{}/shopping/merchants/{}",
            self.site_base_url,
            encode_component(merchant_key)
        )
    }

    #[must_use]
    pub fn listing_page_url(&self) -> String {
        format!("{}/shopping", self.site_base_url)
    }

    /// Opens the merchant's details page directly and reads its hero image.
    ///
    /// The hero lives inside the details modal, so only consent overlays are
    /// dismissed.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`BrowserError`] when the browser cannot be launched.
    pub async fn scrape_by_key(
        &self,
        merchant_key: &str,
        merchant_name: Option<&str>,
    ) -> Result<ScrapeOutcome, BrowserError> {
        let (lease, recorder) = match self.open_recorded_page().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let url = self.details_page_url(merchant_key);
        let outcome = self
            .key_steps(lease.page(), &recorder, &url, merchant_name)
            .await
            .unwrap_or_else(ScrapeOutcome::failed);

        finish(lease, recorder).await;
        tracing::debug!(merchant_key, ?outcome, "scrape by key finished");
        Ok(outcome)
    }

    /// Searches the listing page's autocomplete the way a user would and
    /// reads the hero image of the chosen merchant.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`BrowserError`] when the browser cannot be launched.
    pub async fn scrape_by_search(&self, query: &str) -> Result<ScrapeOutcome, BrowserError> {
        let (lease, recorder) = match self.open_recorded_page().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let outcome = self
            .search_steps(lease.page(), &recorder, query)
            .await
            .unwrap_or_else(ScrapeOutcome::failed);

        finish(lease, recorder).await;
        tracing::debug!(query, ?outcome, "scrape by search finished");
        Ok(outcome)
    }

    /// Outer `Err` is fatal; inner `Err` is a soft failure already shaped as
    /// an outcome.
    async fn open_recorded_page(
        &self,
    ) -> Result<Result<(PageLease, AssetRecorder), ScrapeOutcome>, BrowserError> {
        let lease = match self.session.open_page().await {
            Ok(lease) => lease,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(Err(ScrapeOutcome::failed(format!("failed to open page: {e}")))),
        };
        match AssetRecorder::attach(lease.page()).await {
            Ok(recorder) => Ok(Ok((lease, recorder))),
            Err(e) => {
                lease.close().await;
                Ok(Err(ScrapeOutcome::failed(format!(
                    "failed to watch network requests: {e}"
                ))))
            }
        }
    }

    async fn key_steps(
        &self,
        page: &Page,
        recorder: &AssetRecorder,
        url: &str,
        merchant_name: Option<&str>,
    ) -> Result<ScrapeOutcome, String> {
        self.navigate(page, url).await?;
        dismiss_overlays(page, OverlayMode::PreserveContent, self.timing.overlay_settle).await;

        let heading = read_heading(page).await;
        let hint = merchant_name.or(heading.as_deref());
        let hero = self.capture_hero(page, recorder, hint).await;
        Ok(ScrapeOutcome::found(hero, heading))
    }

    async fn search_steps(
        &self,
        page: &Page,
        recorder: &AssetRecorder,
        query: &str,
    ) -> Result<ScrapeOutcome, String> {
        self.navigate(page, &self.listing_page_url()).await?;
        dismiss_overlays(page, OverlayMode::Full, self.timing.overlay_settle).await;

        let input_script = &first_visible_selector_script(SEARCH_INPUT_SELECTORS);
        let settle = self.timing.overlay_settle;
        let input_selector = poll_until(
            self.timing.poll_interval,
            self.timing.search_input_deadline,
            || async move {
                let found = eval_string(page, input_script).await;
                if found.is_none() {
                    dismiss_overlays(page, OverlayMode::Full, settle).await;
                }
                found
            },
        )
        .await
        .ok_or_else(|| "search input not found".to_string())?;

        let input = page
            .find_element(input_selector.as_str())
            .await
            .map_err(|e| format!("search input vanished: {e}"))?;
        input
            .click()
            .await
            .map_err(|e| format!("search input not clickable: {e}"))?;
        for ch in query.chars() {
            input
                .type_str(ch.to_string())
                .await
                .map_err(|e| format!("typing into search input failed: {e}"))?;
            tokio::time::sleep(self.timing.keystroke_delay).await;
        }
        input
            .press_key("ArrowDown")
            .await
            .map_err(|e| format!("arrow key failed: {e}"))?;
        tokio::time::sleep(self.timing.autocomplete_settle).await;

        let options_script = &autocomplete_options_script();
        let options = poll_until(
            self.timing.poll_interval,
            self.timing.autocomplete_deadline,
            || read_options(page, options_script),
        )
        .await
        .ok_or_else(|| format!("no autocomplete options for \"{query}\""))?;

        let index = pick_option(&options.texts, query)
            .ok_or_else(|| format!("no autocomplete options for \"{query}\""))?;
        let chosen = options.texts[index].trim().to_string();
        tracing::debug!(query, chosen, index, "clicking autocomplete option");

        let clicked = page
            .evaluate(click_nth_visible_script(&options.selector, index))
            .await
            .map_err(|e| format!("clicking autocomplete option failed: {e}"))?
            .into_value::<bool>()
            .unwrap_or(false);
        if !clicked {
            return Err(format!("autocomplete option \"{chosen}\" disappeared"));
        }

        let name = (!chosen.is_empty()).then_some(chosen);
        let hero = self.capture_hero(page, recorder, name.as_deref()).await;
        Ok(ScrapeOutcome::found(hero, name))
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<(), String> {
        tracing::debug!(url, "navigating");
        match tokio::time::timeout(self.timing.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("navigation to {url} failed: {e}")),
            Err(_) => Err(format!(
                "navigation to {url} timed out after {}s",
                self.timing.navigation_timeout.as_secs()
            )),
        }
    }

    async fn capture_hero(
        &self,
        page: &Page,
        recorder: &AssetRecorder,
        merchant_name: Option<&str>,
    ) -> Option<String> {
        let script = &hero_image_script();
        let from_dom = poll_until(self.timing.poll_interval, self.timing.hero_deadline, || async move {
            valid_dom_hero(eval_string(page, script).await)
        })
        .await;
        if from_dom.is_some() {
            return from_dom;
        }

        let recorded = recorder.snapshot().await;
        tracing::debug!(count = recorded.len(), "no hero in DOM, ranking recorded assets");
        pick_best_asset(&recorded, merchant_name)
    }
}

/// Broad selectors can hit icons or off-host images; those count as no hit
/// so polling continues and the recorded assets stay in play.
fn valid_dom_hero(found: Option<String>) -> Option<String> {
    found.filter(|url| is_hero_asset_url(url))
}

async fn finish(lease: PageLease, recorder: AssetRecorder) {
    drop(recorder);
    lease.close().await;
}

async fn eval_string(page: &Page, script: &str) -> Option<String> {
    page.evaluate(script)
        .await
        .ok()?
        .into_value::<String>()
        .ok()
        .filter(|s| !s.is_empty())
}

async fn read_options(page: &Page, script: &str) -> Option<AutocompleteOptions> {
    page.evaluate(script)
        .await
        .ok()?
        .into_value::<AutocompleteOptions>()
        .ok()
        .filter(|o| !o.selector.is_empty() && !o.texts.is_empty())
}

async fn read_heading(page: &Page) -> Option<String> {
    eval_string(page, heading_script()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(texts: &[&str]) -> Vec<String> {
        texts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn exact_match_beats_earlier_substring() {
        let opts = options(&["Nike Outlet", "nike", "Nike Kids"]);
        assert_eq!(pick_option(&opts, "Nike"), Some(1));
    }

    #[test]
    fn substring_match_when_no_exact() {
        let opts = options(&["Adidas", "Nike Outlet", "Nike Kids"]);
        assert_eq!(pick_option(&opts, " nike "), Some(1));
    }

    #[test]
    fn falls_back_to_first_option() {
        let opts = options(&["Adidas", "Puma"]);
        assert_eq!(pick_option(&opts, "Nike"), Some(0));
    }

    #[test]
    fn no_options_means_none() {
        assert_eq!(pick_option(&[], "Nike"), None);
    }

    #[test]
    fn blank_query_picks_first() {
        let opts = options(&["", "Nike"]);
        assert_eq!(pick_option(&opts, "  "), Some(0));
    }

    #[test]
    fn record_asset_filters_and_dedupes() {
        let mut urls = Vec::new();
        record_asset(&mut urls, "https://cdn-assets.affirm.com/m/hero.jpg");
        record_asset(&mut urls, "https://cdn-assets.affirm.com/icons/x.png");
        record_asset(&mut urls, "https://cdn-assets.affirm.com/app.js");
        record_asset(&mut urls, "https://cdn-assets.affirm.com/m/hero.jpg");
        record_asset(&mut urls, "https://cdn-assets.affirm.com/m/banner.webp");
        assert_eq!(
            urls,
            vec![
                "https://cdn-assets.affirm.com/m/hero.jpg".to_string(),
                "https://cdn-assets.affirm.com/m/banner.webp".to_string(),
            ]
        );
    }

    #[test]
    fn dom_hero_must_pass_the_asset_filter() {
        assert_eq!(
            valid_dom_hero(Some("https://cdn-assets.affirm.com/m/nike/hero.jpg".to_string())),
            Some("https://cdn-assets.affirm.com/m/nike/hero.jpg".to_string())
        );
        assert_eq!(
            valid_dom_hero(Some("https://cdn-assets.affirm.com/icons/nike.png".to_string())),
            None
        );
        assert_eq!(valid_dom_hero(Some("https://tracker.example.com/banner.jpg".to_string())), None);
        assert_eq!(valid_dom_hero(None), None);
    }

    #[test]
    fn outcome_without_hero_carries_error() {
        let outcome = ScrapeOutcome::found(None, Some("Nike".to_string()));
        assert_eq!(outcome.error.as_deref(), Some("no hero image found"));
        assert_eq!(outcome.name.as_deref(), Some("Nike"));

        let ok = ScrapeOutcome::found(Some("https://x/hero.jpg".to_string()), None);
        assert!(ok.error.is_none());
    }

    #[test]
    fn page_urls_are_built_from_site_base() {
        let session = Arc::new(BrowserSession::new(crate::SessionOptions {
            chrome_path: None,
            headless: true,
            max_pages: 1,
            user_agent: "ua".to_string(),
        }));
        let scraper = BrowserScraper::new(session, "https://www.affirm.com/");
        assert_eq!(scraper.listing_page_url(), "https://www.affirm.com/shopping");
        assert_eq!(
            scraper.details_page_url("ARI 1/2"),
            "https://www.affirm.com/shopping/merchants/ARI%201%2F2"
        );
    }

    #[tokio::test]
    async fn closed_session_is_fatal_for_both_strategies() {
        let session = Arc::new(BrowserSession::new(crate::SessionOptions {
            chrome_path: None,
            headless: true,
            max_pages: 1,
            user_agent: "ua".to_string(),
        }));
        session.shutdown().await;
        let scraper = BrowserScraper::new(session, "https://www.affirm.com");
        assert!(matches!(
            scraper.scrape_by_key("ARI", None).await,
            Err(BrowserError::Closed)
        ));
        assert!(matches!(
            scraper.scrape_by_search("Nike").await,
            Err(BrowserError::Closed)
        ));
    }
}
