//! In-page JavaScript used by the scrapers.
//!
//! Every script is a self-invoking expression that returns a JSON-friendly
//! value and never `null`: chromiumoxide reports a `null` result as a missing
//! value, so "nothing found" is encoded as `""`, `0`, or an empty list.

/// Images inside the merchant details modal, most specific first.
pub const HERO_SELECTORS: &[&str] = &[
    "[data-testid='merchant-hero-image'] img",
    "[data-testid*='hero'] img",
    "[role='dialog'] img[class*='hero' i]",
    "[role='dialog'] [class*='hero' i] img",
    "[role='dialog'] [class*='banner' i] img",
    "img[class*='hero' i]",
    "[class*='Hero'] img",
    "[class*='banner' i] img",
];

/// Consent and toast dismissals that never close the content being scraped.
pub const SAFE_DISMISS_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#truste-consent-button",
    "button[aria-label='Accept cookies']",
    "[data-testid='cookie-banner'] button",
    "[id*='cookie' i] button[id*='accept' i]",
    "[class*='cookie' i] button[class*='accept' i]",
    "[data-testid='toast-close']",
];

/// Extra dismissals for modals that block the page itself.
pub const MODAL_CLOSE_SELECTORS: &[&str] = &[
    "[role='dialog'] button[aria-label*='close' i]",
    "[aria-modal='true'] button[aria-label*='close' i]",
    "[data-testid='modal-close']",
    "[data-testid='close-button']",
    "button[aria-label='Dismiss']",
];

pub const MODAL_PRESENT_SELECTORS: &[&str] = &["[role='dialog']", "[aria-modal='true']"];

pub const SEARCH_INPUT_SELECTORS: &[&str] = &[
    "input[type='search']",
    "[data-testid='search-input'] input",
    "input[data-testid*='search' i]",
    "input[placeholder*='search' i]",
    "input[aria-label*='search' i]",
    "input[name='query']",
];

pub const AUTOCOMPLETE_OPTION_SELECTORS: &[&str] = &[
    "[role='listbox'] [role='option']",
    "[data-testid*='suggestion' i]",
    "[class*='autocomplete' i] li",
    "[class*='suggestion' i] li",
];

const VISIBLE_FN: &str = "const visible = (el) => { \
    const style = window.getComputedStyle(el); \
    return style.visibility !== 'hidden' && style.display !== 'none' && el.getClientRects().length > 0; \
};";

fn selector_list(selectors: &[&str]) -> String {
    serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string())
}

/// Returns the first image URL under a hero selector, or `""`.
#[must_use]
pub fn hero_image_script() -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          for (const sel of {list}) {{ \
            for (const el of document.querySelectorAll(sel)) {{ \
              const src = el.currentSrc || el.src || el.getAttribute('src') || ''; \
              if (!/^https?:\\/\\//i.test(src)) continue; \
              if (el.complete && el.naturalWidth > 0 && el.naturalWidth < 300) continue; \
              if (visible(el)) return src; \
            }} \
          }} \
          return ''; \
        }})()",
        list = selector_list(HERO_SELECTORS),
    )
}

/// Clicks every visible element matching `selectors`; returns the count.
#[must_use]
pub fn click_visible_script(selectors: &[&str]) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          let clicked = 0; \
          for (const sel of {list}) {{ \
            let els = []; \
            try {{ els = document.querySelectorAll(sel); }} catch (e) {{ continue; }} \
            for (const el of els) {{ \
              if (visible(el)) {{ el.click(); clicked += 1; }} \
            }} \
          }} \
          return clicked; \
        }})()",
        list = selector_list(selectors),
    )
}

/// Whether a visible element matches any of `selectors`.
#[must_use]
pub fn any_visible_script(selectors: &[&str]) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          return {list}.some((sel) => Array.from(document.querySelectorAll(sel)).some(visible)); \
        }})()",
        list = selector_list(selectors),
    )
}

/// Returns the first selector with a visible match, or `""`.
#[must_use]
pub fn first_visible_selector_script(selectors: &[&str]) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          for (const sel of {list}) {{ \
            const el = document.querySelector(sel); \
            if (el && visible(el)) return sel; \
          }} \
          return ''; \
        }})()",
        list = selector_list(selectors),
    )
}

/// Returns `{{selector, texts}}` for the first selector with visible options.
#[must_use]
pub fn autocomplete_options_script() -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          for (const sel of {list}) {{ \
            const els = Array.from(document.querySelectorAll(sel)).filter(visible); \
            if (els.length > 0) {{ \
              return {{ selector: sel, texts: els.map((el) => (el.innerText || el.textContent || '').trim()) }}; \
            }} \
          }} \
          return {{ selector: '', texts: [] }}; \
        }})()",
        list = selector_list(AUTOCOMPLETE_OPTION_SELECTORS),
    )
}

/// Clicks the `index`-th visible match of `selector`; returns whether it did.
#[must_use]
pub fn click_nth_visible_script(selector: &str, index: usize) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} \
          const els = Array.from(document.querySelectorAll({sel})).filter(visible); \
          const el = els[{index}]; \
          if (!el) return false; \
          el.scrollIntoView({{ block: 'center' }}); \
          el.click(); \
          return true; \
        }})()",
        sel = serde_json::to_string(selector).unwrap_or_else(|_| "''".to_string()),
    )
}

/// Heading text of the open merchant modal (or the page), or `""`.
#[must_use]
pub fn heading_script() -> &'static str {
    "(() => { \
      const el = document.querySelector(\"[role='dialog'] h1, [role='dialog'] h2, h1\"); \
      return el ? (el.textContent || '').trim() : ''; \
    })()"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hero_script_embeds_every_selector() {
        let script = hero_image_script();
        for sel in HERO_SELECTORS {
            let quoted = serde_json::to_string(sel).unwrap();
            assert!(script.contains(&quoted), "missing {sel}");
        }
        assert!(script.starts_with("(() =>"));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn click_nth_escapes_selector() {
        let script = click_nth_visible_script("li[data-x=\"a\"]", 2);
        assert!(script.contains(r#""li[data-x=\"a\"]""#));
        assert!(script.contains("els[2]"));
    }

    #[test]
    fn scripts_never_return_null() {
        for script in [
            hero_image_script(),
            click_visible_script(SAFE_DISMISS_SELECTORS),
            first_visible_selector_script(SEARCH_INPUT_SELECTORS),
            autocomplete_options_script(),
            heading_script().to_string(),
        ] {
            assert!(!script.contains("return null"), "{script}");
        }
    }
}
