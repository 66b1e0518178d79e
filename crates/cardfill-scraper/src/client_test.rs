use super::*;

fn client() -> MarketplaceClient {
    MarketplaceClient::new(
        "https://www.affirm.com/api/",
        "https://www.affirm.com",
        5,
        "cardfill-test/0.1",
    )
    .unwrap()
}

#[test]
fn search_url_encodes_query_and_entity_type() {
    let url = client().search_url("Bed Bath & Beyond").unwrap();
    assert_eq!(
        url,
        "https://www.affirm.com/api/marketplace/search/v2/?query=Bed+Bath+%26+Beyond&entity_type=merchants"
    );
}

#[test]
fn search_url_rejects_invalid_base() {
    let client = MarketplaceClient::new("not a url", "https://x.test", 5, "ua").unwrap();
    let err = client.search_url("nike").unwrap_err();
    assert!(
        matches!(err, ScraperError::InvalidUrl { .. }),
        "expected InvalidUrl, got: {err:?}"
    );
}

#[test]
fn details_url_escapes_key() {
    assert_eq!(
        client().details_url("ARI/42 x"),
        "https://www.affirm.com/api/marketplace/merchants/v2/ARI%2F42%20x/details"
    );
}

#[test]
fn base_urls_lose_trailing_slash() {
    let c = client();
    assert_eq!(c.api_base_url, "https://www.affirm.com/api");
    assert_eq!(c.site_base_url(), "https://www.affirm.com");
}

#[tokio::test]
async fn fetch_image_rejects_non_http_scheme() {
    let err = client().fetch_image("file:///etc/passwd").await.unwrap_err();
    assert!(
        matches!(err, ScraperError::InvalidUrl { .. }),
        "expected InvalidUrl, got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_image_rejects_relative_url() {
    let err = client().fetch_image("/images/hero.jpg").await.unwrap_err();
    assert!(matches!(err, ScraperError::InvalidUrl { .. }));
}
