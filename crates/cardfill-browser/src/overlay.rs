use std::time::Duration;

use chromiumoxide::Page;

use crate::scripts::{
    any_visible_script, click_visible_script, MODAL_CLOSE_SELECTORS, MODAL_PRESENT_SELECTORS,
    SAFE_DISMISS_SELECTORS,
};

/// Upper bound on dismissal rounds per call.
pub const MAX_OVERLAY_ROUNDS: usize = 4;

/// How aggressively overlays are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Only consent banners and toasts; an open merchant modal stays open.
    PreserveContent,
    /// Also closes blocking modals and presses Escape while one remains.
    Full,
}

impl OverlayMode {
    #[must_use]
    pub fn selectors(self) -> Vec<&'static str> {
        match self {
            Self::PreserveContent => SAFE_DISMISS_SELECTORS.to_vec(),
            Self::Full => SAFE_DISMISS_SELECTORS
                .iter()
                .chain(MODAL_CLOSE_SELECTORS)
                .copied()
                .collect(),
        }
    }
}

/// Clicks away consent/modal overlays, returning how many actions were taken.
///
/// Stops early after a round with no action. Script failures count as "no
/// action"; a page mid-navigation simply ends the loop.
pub async fn dismiss_overlays(page: &Page, mode: OverlayMode, settle: Duration) -> usize {
    let click_script = click_visible_script(&mode.selectors());
    let modal_script = any_visible_script(MODAL_PRESENT_SELECTORS);
    let mut actions = 0;

    for round in 0..MAX_OVERLAY_ROUNDS {
        let clicked = match page.evaluate(click_script.as_str()).await {
            Ok(result) => result.into_value::<usize>().unwrap_or(0),
            Err(e) => {
                tracing::debug!(error = %e, round, "overlay click script failed");
                0
            }
        };

        let escaped = mode == OverlayMode::Full
            && modal_visible(page, &modal_script).await
            && press_escape(page).await;

        let round_actions = clicked + usize::from(escaped);
        if round_actions == 0 {
            break;
        }
        tracing::debug!(round, clicked, escaped, ?mode, "dismissed overlays");
        actions += round_actions;
        tokio::time::sleep(settle).await;
    }

    actions
}

async fn modal_visible(page: &Page, script: &str) -> bool {
    match page.evaluate(script).await {
        Ok(result) => result.into_value::<bool>().unwrap_or(false),
        Err(_) => false,
    }
}

async fn press_escape(page: &Page) -> bool {
    let Ok(body) = page.find_element("body").await else {
        return false;
    };
    body.press_key("Escape").await.is_ok()
}
