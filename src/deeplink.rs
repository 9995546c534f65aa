//! Deep-link and install-fallback targets.
//!
//! On mobile, a missing provider is not a dead end: redirecting through the
//! wallet's app-link host re-opens the current page inside the wallet's
//! embedded browser, which injects a provider. On desktop the only fallback
//! is an install prompt.

use tokio::sync::watch;
use url::Url;

use crate::config::DeepLinkPolicy;
use crate::platform::Platform;

/// App-link host that routes into the wallet's mobile browser.
pub const WALLET_APP_LINK: &str = "https://metamask.app.link";

const DESKTOP_INSTALL_URL: &str = "https://metamask.io/download/";
const IOS_STORE_URL: &str = "https://apps.apple.com/app/metamask/id1438144202";
const ANDROID_STORE_URL: &str = "https://play.google.com/store/apps/details?id=io.metamask";

/// Deep link that re-opens `page_url` inside the wallet's mobile browser.
pub fn dapp_deep_link(page_url: &Url) -> String {
    format!(
        "{WALLET_APP_LINK}/dapp/{}",
        urlencoding::encode(page_url.as_str())
    )
}

/// Install/store target for a platform with no provider.
pub fn install_url(platform: Platform) -> &'static str {
    match platform {
        Platform::Desktop => DESKTOP_INSTALL_URL,
        Platform::Ios => IOS_STORE_URL,
        Platform::Android => ANDROID_STORE_URL,
    }
}

/// Outcome of the app-link vs store-redirect race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The app link took over (navigation or provider-bearing focus return).
    Canceled,
    /// The delay elapsed; the caller should redirect to the store.
    StoreRedirect(String),
}

/// Race a store redirect against app-link takeover.
///
/// The caller flips `cancel` to `true` the instant the page is known to have
/// navigated away, or regains focus with a provider present (when
/// `policy.cancel_on_focus` is set). A dropped sender counts as cancellation:
/// the owning session is gone and must not be redirected.
pub async fn store_fallback(
    platform: Platform,
    policy: &DeepLinkPolicy,
    mut cancel: watch::Receiver<bool>,
) -> FallbackOutcome {
    if *cancel.borrow() {
        return FallbackOutcome::Canceled;
    }

    let timer = tokio::time::sleep(policy.store_fallback_delay);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => {
                return FallbackOutcome::StoreRedirect(install_url(platform).to_string());
            }
            changed = cancel.changed() => {
                match changed {
                    Ok(()) if *cancel.borrow() => return FallbackOutcome::Canceled,
                    Ok(()) => {}
                    Err(_) => return FallbackOutcome::Canceled,
                }
            }
        }
    }
}

/// Hand a link to the OS (deep link or install page). Failure is logged and
/// tolerated; the caller keeps the URL to surface it manually.
pub fn open_external(target: &str) -> bool {
    match open::that(target) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(%target, %error, "could not open link automatically");
            false
        }
    }
}
