//! Message contract between the design-tool plugin UI and its host script.
//!
//! The host script drives `/lookup` once per merchant and reports progress
//! back to the UI with these events. The CLI's `run` command emits the same
//! events so a batch can be exercised without the design tool.

use serde::{Deserialize, Serialize};

/// UI → host: start filling cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub merchants: Vec<String>,
    pub server_base: String,
    #[serde(default)]
    pub layer_names: LayerNames,
    #[serde(default)]
    pub layer_toggles: LayerToggles,
}

/// Names of the layers the host script looks for inside each card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerNames {
    pub name: String,
    pub logo: String,
    pub hero: String,
}

impl Default for LayerNames {
    fn default() -> Self {
        Self {
            name: "Merchant name".to_string(),
            logo: "Logo".to_string(),
            hero: "Hero".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerToggles {
    pub name: bool,
    pub logo: bool,
    pub hero: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            name: true,
            logo: true,
            hero: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Skipped,
    Fetch,
    Populate,
    Done,
    Error,
}

/// Host → UI progress events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginEvent {
    Status {
        index: usize,
        code: StatusCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete { error_count: usize },
}

/// Normalize a user-entered server base the way the host script does:
/// default scheme `http://`, no trailing slash.
#[must_use]
pub fn normalize_server_base(raw: &str) -> String {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.is_empty() {
        "http://localhost:8787".to_string()
    } else if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}
