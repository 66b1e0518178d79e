//! Merchant lookup data model shared by the scraper, resolver, and server.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::QueryError;

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single URL component (query value or path segment).
#[must_use]
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// A trimmed, non-empty merchant name supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery(String);

impl LookupQuery {
    /// # Errors
    ///
    /// Returns [`QueryError::Empty`] when the input is blank after trimming.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_query(self)
    }
}

impl fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased, trimmed form of a [`LookupQuery`]; identifies cache and
/// in-flight entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn from_query(query: &LookupQuery) -> Self {
        Self(query.as_str().trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A merchant-like object extracted from a raw search payload, with its
/// ranking score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantCandidate {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub merchant_key: Option<String>,
    pub subtitle: Option<String>,
    pub score: i32,
}

/// Final resolution result; the unit returned to clients and the unit cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRecord {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub hero_url: Option<String>,
    #[serde(rename = "merchantAri", alias = "merchantKey")]
    pub merchant_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Reason the hero scrape fell short; present on best-effort records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_query_trims_input() {
        let query = LookupQuery::parse("  Nike \n").unwrap();
        assert_eq!(query.as_str(), "Nike");
    }

    #[test]
    fn lookup_query_rejects_blank_input() {
        assert_eq!(LookupQuery::parse("   "), Err(QueryError::Empty));
        assert_eq!(LookupQuery::parse(""), Err(QueryError::Empty));
    }

    #[test]
    fn cache_key_is_case_insensitive() {
        let a = LookupQuery::parse("Macy's").unwrap().cache_key();
        let b = LookupQuery::parse("  MACY'S").unwrap().cache_key();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "macy's");
    }

    #[test]
    fn encode_component_matches_uri_component_rules() {
        assert_eq!(encode_component("Nike"), "Nike");
        assert_eq!(encode_component("Macy's"), "Macy's");
        assert_eq!(encode_component("Bed Bath & Beyond"), "Bed%20Bath%20%26%20Beyond");
        assert_eq!(encode_component("a/b?c"), "a%2Fb%3Fc");
    }

    #[test]
    fn merchant_record_serializes_key_as_merchant_ari() {
        let record = MerchantRecord {
            name: Some("Nike".to_string()),
            logo_url: None,
            hero_url: Some("https://cdn.example.com/hero.jpg".to_string()),
            merchant_key: Some("ARI123".to_string()),
            subtitle: None,
            error: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["merchantAri"], "ARI123");
        assert_eq!(json["heroUrl"], "https://cdn.example.com/hero.jpg");
        assert!(json["logoUrl"].is_null());
        assert!(json.get("error").is_none());
        assert!(json.get("subtitle").is_none());
    }
}
