//! Best-effort merchant extraction and ranking over raw search payloads.
//!
//! The search endpoint is undocumented and has nested merchants under
//! different keys across versions. Extraction walks every known shape and
//! never fails: an unrecognized payload simply yields no candidates.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use cardfill_core::MerchantCandidate;

const MERCHANT_KEY_POINTS: i32 = 200;
const EXACT_MATCH_POINTS: i32 = 100;
const SUBSTRING_MATCH_POINTS: i32 = 50;
const WORD_MATCH_POINTS: i32 = 20;
const LOGO_POINTS: i32 = 10;
const PLACEHOLDER_LOGO_PENALTY: i32 = 30;

/// Candidates scoring below this are treated as no match at all.
pub const MIN_VIABLE_SCORE: i32 = 20;

/// Flat list locations, as JSON pointers, where merchants have been seen.
const ITEM_LIST_POINTERS: &[&str] = &[
    "/results",
    "/results/merchants",
    "/merchants",
    "/entities",
    "/data/merchants",
    "/data/results",
    "/data/entities",
];

const NAME_POINTERS: &[&str] = &[
    "/title",
    "/name",
    "/merchant_name",
    "/merchantName",
    "/display_name",
    "/displayName",
];

const KEY_POINTERS: &[&str] = &[
    "/action/merchant_detail_page/merchant_ari",
    "/action/merchant_ari",
    "/merchant_ari",
    "/merchantAri",
    "/ari",
    "/merchant_id",
    "/merchantId",
];

const LOGO_POINTERS: &[&str] = &[
    "/icon_url",
    "/iconUrl",
    "/logo_url",
    "/logoUrl",
    "/icon_image_url",
    "/logo",
    "/icon",
    "/images/logo",
    "/images/logo_url",
    "/images/logo/url",
    "/images/icon",
    "/images/icon_url",
    "/images/icon/url",
];

const SUBTITLE_POINTERS: &[&str] = &["/subtitle", "/description"];

static PLACEHOLDER_LOGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(placeholder|default[-_]?(logo|icon|image)|no[-_]?image|generic[-_]?(logo|icon))")
        .expect("valid placeholder regex")
});

/// Flattens every known nesting shape into candidate records, in payload
/// order, with scores computed against `query`.
#[must_use]
pub fn extract_candidates(payload: &Value, query: &str) -> Vec<MerchantCandidate> {
    collect_items(payload)
        .into_iter()
        .filter_map(|item| candidate_from_item(item, query))
        .collect()
}

/// Picks the highest-scoring candidate, or `None` when nothing is viable.
///
/// Ties keep payload order.
#[must_use]
pub fn best_candidate(payload: &Value, query: &str) -> Option<MerchantCandidate> {
    let mut candidates = extract_candidates(payload, query);
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    for candidate in candidates.iter().take(5) {
        tracing::debug!(
            query,
            name = ?candidate.name,
            merchant_key = ?candidate.merchant_key,
            score = candidate.score,
            "scored merchant candidate"
        );
    }

    candidates
        .into_iter()
        .next()
        .filter(|c| c.score >= MIN_VIABLE_SCORE)
}

fn collect_items(payload: &Value) -> Vec<&Value> {
    let mut items: Vec<&Value> = Vec::new();

    if let Some(array) = payload.as_array() {
        items.extend(array.iter());
    }

    if let Some(modules) = payload.get("modules").and_then(Value::as_array) {
        for module in modules {
            for key in ["entities", "items"] {
                if let Some(entities) = module.get(key).and_then(Value::as_array) {
                    items.extend(entities.iter());
                }
            }
        }
    }

    for pointer in ITEM_LIST_POINTERS {
        if let Some(list) = payload.pointer(pointer).and_then(Value::as_array) {
            items.extend(list.iter());
        }
    }

    items
}

fn candidate_from_item(item: &Value, query: &str) -> Option<MerchantCandidate> {
    if !item.is_object() {
        return None;
    }

    let name = first_string(item, NAME_POINTERS);
    let merchant_key = first_string(item, KEY_POINTERS);
    let logo_url = first_string(item, LOGO_POINTERS);
    if name.is_none() && merchant_key.is_none() && logo_url.is_none() {
        return None;
    }
    let subtitle = first_string(item, SUBTITLE_POINTERS);

    let mut candidate = MerchantCandidate {
        name,
        logo_url,
        merchant_key,
        subtitle,
        score: 0,
    };
    candidate.score = score_candidate(&candidate, query);
    Some(candidate)
}

fn score_candidate(candidate: &MerchantCandidate, query: &str) -> i32 {
    let mut score = 0;

    if candidate.merchant_key.is_some() {
        score += MERCHANT_KEY_POINTS;
    }

    let query_lower = query.trim().to_lowercase();
    if let Some(name) = &candidate.name {
        let name_lower = name.trim().to_lowercase();
        if !query_lower.is_empty() {
            if name_lower == query_lower {
                score += EXACT_MATCH_POINTS;
            }
            if name_lower.contains(&query_lower) {
                score += SUBSTRING_MATCH_POINTS;
            }
        }

        let name_words: Vec<&str> = name_lower.split_whitespace().collect();
        let matching_words = query_lower
            .split_whitespace()
            .filter(|qw| name_words.iter().any(|nw| nw.contains(qw)))
            .count();
        score += i32::try_from(matching_words)
            .unwrap_or(i32::MAX / WORD_MATCH_POINTS)
            .saturating_mul(WORD_MATCH_POINTS);
    }

    if let Some(logo) = &candidate.logo_url {
        score += LOGO_POINTS;
        if PLACEHOLDER_LOGO_RE.is_match(logo) {
            score -= PLACEHOLDER_LOGO_PENALTY;
        }
    }

    score
}

fn first_string(item: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| match item.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn module_payload(entities: Value) -> Value {
        json!({ "modules": [{ "entities": entities }] })
    }

    #[test]
    fn prefers_exact_match_with_key_over_substring_without_key() {
        let payload = module_payload(json!([
            {
                "title": "Nike",
                "icon_url": "https://cdn.example.com/nike.png",
                "action": { "merchant_detail_page": { "merchant_ari": "ARI_NIKE" } }
            },
            {
                "title": "Nike Outlet Reseller",
                "icon_url": "https://cdn.example.com/outlet.png"
            }
        ]));
        let best = best_candidate(&payload, "nike").expect("candidate");
        assert_eq!(best.name.as_deref(), Some("Nike"));
        assert_eq!(best.merchant_key.as_deref(), Some("ARI_NIKE"));
    }

    #[test]
    fn order_in_payload_does_not_change_the_winner() {
        let payload = module_payload(json!([
            { "title": "Nike Outlet Reseller" },
            { "title": "Nike", "merchant_ari": "ARI_NIKE" }
        ]));
        let best = best_candidate(&payload, "Nike").unwrap();
        assert_eq!(best.merchant_key.as_deref(), Some("ARI_NIKE"));
    }

    #[test]
    fn ties_keep_payload_order() {
        let payload = json!({ "results": [
            { "name": "Acme", "merchant_ari": "FIRST" },
            { "name": "Acme", "merchant_ari": "SECOND" }
        ]});
        let best = best_candidate(&payload, "acme").unwrap();
        assert_eq!(best.merchant_key.as_deref(), Some("FIRST"));
    }

    #[test]
    fn keyless_candidate_can_still_win_when_alone() {
        let payload = json!({ "results": { "merchants": [
            { "merchant_name": "Samsung", "logo_url": "https://cdn.example.com/samsung.png" }
        ]}});
        let best = best_candidate(&payload, "Samsung").unwrap();
        assert_eq!(best.name.as_deref(), Some("Samsung"));
        assert!(best.merchant_key.is_none());
        assert_eq!(
            best.logo_url.as_deref(),
            Some("https://cdn.example.com/samsung.png")
        );
    }

    #[test]
    fn placeholder_logo_is_penalized() {
        let payload = json!({ "merchants": [
            { "name": "Acme", "merchant_ari": "A", "logo_url": "https://cdn.example.com/placeholder-logo.png" },
            { "name": "Acme", "merchant_ari": "B", "logo_url": "https://cdn.example.com/acme.png" }
        ]});
        let best = best_candidate(&payload, "acme").unwrap();
        assert_eq!(best.merchant_key.as_deref(), Some("B"));
    }

    #[test]
    fn reads_logo_from_nested_images_object() {
        let payload = json!({ "data": { "merchants": [
            { "displayName": "Wayfair", "ari": "W1", "images": { "logo": { "url": "https://cdn.example.com/w.png" } } }
        ]}});
        let best = best_candidate(&payload, "wayfair").unwrap();
        assert_eq!(best.logo_url.as_deref(), Some("https://cdn.example.com/w.png"));
        assert_eq!(best.merchant_key.as_deref(), Some("W1"));
    }

    #[test]
    fn numeric_merchant_ids_become_strings() {
        let payload = json!({ "entities": [{ "name": "Acme", "merchant_id": 4242 }] });
        let best = best_candidate(&payload, "acme").unwrap();
        assert_eq!(best.merchant_key.as_deref(), Some("4242"));
    }

    #[test]
    fn word_overlap_adds_points() {
        let candidates = extract_candidates(
            &json!({ "results": [{ "name": "Bed Bath and Beyond" }, { "name": "Bedding World" }] }),
            "bed beyond",
        );
        assert!(candidates[0].score > candidates[1].score);
    }

    #[test]
    fn unrelated_keyless_candidates_are_not_viable() {
        let payload = json!({ "results": [{ "name": "Something Else" }] });
        assert!(best_candidate(&payload, "nike").is_none());
    }

    #[test]
    fn unknown_shapes_yield_nothing() {
        assert!(best_candidate(&json!({ "unexpected": true }), "nike").is_none());
        assert!(best_candidate(&json!(null), "nike").is_none());
        assert!(best_candidate(&json!("string body"), "nike").is_none());
        assert!(best_candidate(&module_payload(json!("not-a-list")), "nike").is_none());
    }

    #[test]
    fn items_without_any_useful_field_are_skipped() {
        let payload = json!({ "results": [ {}, 5, { "other": "x" } ] });
        assert!(extract_candidates(&payload, "nike").is_empty());
    }
}
