use cardfill_core::{encode_component, LookupQuery, MerchantRecord};

pub const MOCK_MERCHANT_KEY: &str = "MOCK123";

/// Deterministic placeholder record for `USE_MOCK` mode. Never touches the
/// network.
#[must_use]
pub fn build_mock(query: &LookupQuery) -> MerchantRecord {
    let encoded = encode_component(query.as_str());
    MerchantRecord {
        name: Some(query.as_str().to_string()),
        logo_url: Some(format!("https://via.placeholder.com/128?text={encoded}+logo")),
        hero_url: Some(format!(
            "https://via.placeholder.com/800x400?text={encoded}+hero"
        )),
        merchant_key: Some(MOCK_MERCHANT_KEY.to_string()),
        subtitle: None,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nike_logo_contains_literal_marker() {
        let record = build_mock(&LookupQuery::parse("Nike").unwrap());
        assert_eq!(
            record.logo_url.as_deref(),
            Some("https://via.placeholder.com/128?text=Nike+logo")
        );
        assert_eq!(
            record.hero_url.as_deref(),
            Some("https://via.placeholder.com/800x400?text=Nike+hero")
        );
        assert_eq!(record.merchant_key.as_deref(), Some("MOCK123"));
        assert_eq!(record.name.as_deref(), Some("Nike"));
    }

    #[test]
    fn query_is_percent_encoded() {
        let record = build_mock(&LookupQuery::parse("Bed Bath & Beyond").unwrap());
        assert_eq!(
            record.logo_url.as_deref(),
            Some("https://via.placeholder.com/128?text=Bed%20Bath%20%26%20Beyond+logo")
        );
    }

    #[test]
    fn same_query_same_record() {
        let q = LookupQuery::parse("Wayfair").unwrap();
        assert_eq!(build_mock(&q), build_mock(&q));
    }
}
