//! HTTP client for the marketplace's undocumented JSON API and image CDN.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, RequestBuilder, Response};

use cardfill_core::encode_component;

use crate::error::ScraperError;
use crate::types::MerchantDetails;

/// Longest slice of an error body kept in logs.
const ERROR_BODY_SNIPPET: usize = 500;

const JSON_ACCEPT: &str = "application/json, text/plain, */*";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// HTTP client that talks to the marketplace with browser-like headers.
///
/// Non-2xx responses surface as [`ScraperError::UnexpectedStatus`]; nothing
/// is retried here. Callers decide whether a failure is worth a fallback.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: Client,
    api_base_url: String,
    site_base_url: String,
}

impl MarketplaceClient {
    /// Creates a client with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_base_url: &str,
        site_base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn site_base_url(&self) -> &str {
        &self.site_base_url
    }

    /// Runs the merchant search and returns the raw, untyped payload.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network or TLS failure.
    /// - [`ScraperError::Deserialize`] if the body is not JSON.
    pub async fn search_merchants(&self, query: &str) -> Result<serde_json::Value, ScraperError> {
        let url = self.search_url(query)?;
        self.get_json(&url).await
    }

    /// Fetches the merchant details document for an opaque merchant key.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search_merchants`]; a body that is JSON but not an
    /// object-shaped details document is a [`ScraperError::Deserialize`].
    pub async fn merchant_details(&self, merchant_key: &str) -> Result<MerchantDetails, ScraperError> {
        let url = self.details_url(merchant_key);
        let value = self.get_json(&url).await?;
        serde_json::from_value(value).map_err(|e| ScraperError::Deserialize {
            context: format!("merchant details for {merchant_key}"),
            source: e,
        })
    }

    /// GETs `url` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// See [`Self::search_merchants`].
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value, ScraperError> {
        tracing::debug!(url, "GET json");
        let request = self.with_browser_headers(self.client.get(url), JSON_ACCEPT);
        let body = Self::send_checked(request, url).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("response from {url}"),
            source: e,
        })
    }

    /// POSTs a JSON body to `url` and parses the JSON response.
    ///
    /// # Errors
    ///
    /// See [`Self::search_merchants`].
    pub async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ScraperError> {
        tracing::debug!(url, "POST json");
        let request = self.with_browser_headers(self.client.post(url).json(payload), JSON_ACCEPT);
        let body = Self::send_checked(request, url).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("response from {url}"),
            source: e,
        })
    }

    /// GETs `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network or TLS failure.
    pub async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        let request = self.with_browser_headers(
            self.client.get(url),
            "text/html,application/xhtml+xml,*/*;q=0.8",
        );
        Ok(Self::send_checked(request, url).await?.text().await?)
    }

    /// Starts fetching an external image with a referer the image host accepts.
    ///
    /// The returned response has a 2xx status; its body has not been read so
    /// callers can stream it.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] if `url` is not an absolute http(s) URL.
    /// - [`ScraperError::UnexpectedStatus`] carrying the upstream status.
    /// - [`ScraperError::Http`] on network failure.
    pub async fn fetch_image(&self, url: &str) -> Result<Response, ScraperError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
            });
        }
        let request = self.with_browser_headers(self.client.get(parsed), IMAGE_ACCEPT);
        Self::send_checked(request, url).await
    }

    fn with_browser_headers(&self, request: RequestBuilder, accept: &str) -> RequestBuilder {
        request
            .header(ACCEPT, accept)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(REFERER, format!("{}/shopping", self.site_base_url))
    }

    async fn send_checked(request: RequestBuilder, url: &str) -> Result<Response, ScraperError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response body>".to_string());
        let snippet: String = body.chars().take(ERROR_BODY_SNIPPET).collect();
        tracing::debug!(url, status = status.as_u16(), body = %snippet, "upstream returned non-2xx");
        Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }

    /// Builds the search URL for a merchant query.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the configured API base is not
    /// a valid URL.
    fn search_url(&self, query: &str) -> Result<String, ScraperError> {
        let base = format!("{}/marketplace/search/v2/", self.api_base_url);
        let mut url = reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("entity_type", "merchants");
        Ok(url.to_string())
    }

    fn details_url(&self, merchant_key: &str) -> String {
        format!(
            "{}/marketplace/merchants/v2/{}/details",
            self.api_base_url,
            encode_component(merchant_key)
        )
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
