use serde::Deserialize;

/// Subset of the merchant details endpoint the resolver cares about.
///
/// Every field is optional; the endpoint is undocumented and its shape
/// drifts between versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MerchantDetails {
    #[serde(default, alias = "heroImageUrl")]
    pub hero_image_url: Option<String>,
    #[serde(default, alias = "iconImageUrl")]
    pub icon_image_url: Option<String>,
    #[serde(default, alias = "merchantName")]
    pub name: Option<String>,
}
