//! Asset-URL classification and hero-image ranking.
//!
//! The browser scrapes record every image request a page makes; these
//! helpers decide which of those are plausible promotional banners and which
//! one to keep.

use std::sync::LazyLock;

use regex::Regex;

/// Hosts that serve merchant artwork. Matched as dot-delimited suffixes.
const ASSET_HOST_SUFFIXES: &[&str] = &[
    "affirm.com",
    "affirmcdn.com",
    "cloudfront.net",
    "imgix.net",
    "ctfassets.net",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".avif"];

/// Path tokens that mark icons, thumbnails, and stand-in artwork.
const EXCLUDED_PATH_TOKENS: &[&str] = &[
    "icon",
    "icons",
    "favicon",
    "thumb",
    "thumbs",
    "thumbnail",
    "thumbnails",
    "fallback",
    "placeholder",
];

const HERO_TOKENS: &[&str] = &[
    "hero", "banner", "cover", "promo", "header", "splash", "lifestyle", "background",
];

const LOGO_TOKENS: &[&str] = &["logo", "logos", "icon", "icons", "thumb", "thumbnail", "avatar"];

static WIDTH_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](?:w|width|wid)=(\d{2,5})").expect("valid width param regex")
});
static WIDTH_DIMENSIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(\d{2,5})x\d{2,5}(?:[^0-9]|$)").expect("valid dimensions regex")
});

/// Whether `url` can be a hero/promo asset: an allow-listed host, an image
/// file extension, and no icon/thumbnail/fallback path segment.
#[must_use]
pub fn is_hero_asset_url(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let host_allowed = ASSET_HOST_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")));
    if !host_allowed {
        return false;
    }

    let path = parsed.path().to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    if path.contains("/icons/") {
        return false;
    }
    let excluded = path_tokens(&path).any(|token| EXCLUDED_PATH_TOKENS.contains(&token));
    !excluded
}

/// Heuristic hero score; higher is more banner-like.
#[must_use]
pub fn score_hero_url(url: &str) -> i32 {
    let lower = url.to_ascii_lowercase();
    let path = reqwest::Url::parse(url).map_or_else(|_| lower.clone(), |u| u.path().to_ascii_lowercase());
    let tokens: Vec<&str> = path_tokens(&path).collect();

    let mut score = 0;
    if tokens.iter().any(|t| HERO_TOKENS.contains(t)) {
        score += 300;
    }
    if tokens.iter().any(|t| LOGO_TOKENS.contains(t)) {
        score -= 400;
    }

    if let Some(width) = declared_width(&lower) {
        score += if width >= 1200 {
            150
        } else if width >= 800 {
            100
        } else if width >= 400 {
            40
        } else if width < 200 {
            -150
        } else {
            0
        };
    }

    if path.ends_with(".jpg") || path.ends_with(".jpeg") || path.ends_with(".webp") {
        score += 20;
    }

    score
}

/// Chooses the best hero asset among recorded request URLs.
///
/// When a merchant name is known, URLs whose alphanumeric slug contains the
/// name's slug win outright; the generic score only ranks within each group.
/// Ties keep the original order.
#[must_use]
pub fn pick_best_asset<S: AsRef<str>>(urls: &[S], merchant_name: Option<&str>) -> Option<String> {
    let valid: Vec<&str> = urls
        .iter()
        .map(AsRef::as_ref)
        .filter(|u| is_hero_asset_url(u))
        .collect();

    let name_slug = merchant_name.map(slug).filter(|s| !s.is_empty());
    if let Some(name_slug) = name_slug {
        let named: Vec<&str> = valid
            .iter()
            .copied()
            .filter(|u| slug(u).contains(&name_slug))
            .collect();
        if let Some(best) = highest_scoring(&named) {
            return Some(best.to_string());
        }
    }

    highest_scoring(&valid).map(str::to_string)
}

/// Lowercased ASCII-alphanumeric characters of `value`.
#[must_use]
pub fn slug(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn highest_scoring<'a>(urls: &[&'a str]) -> Option<&'a str> {
    urls.iter().copied().fold(None, |best: Option<(&str, i32)>, url| {
        let score = score_hero_url(url);
        match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((url, score)),
        }
    })
    .map(|(url, _)| url)
}

fn path_tokens(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
}

fn declared_width(url_lower: &str) -> Option<u32> {
    WIDTH_PARAM_RE
        .captures(url_lower)
        .or_else(|| WIDTH_DIMENSIONS_RE.captures(url_lower))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}
