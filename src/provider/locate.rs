//! Injected-provider discovery.
//!
//! The locator never blocks and never prompts. A provider that is not yet
//! present may still attach itself shortly after page load, so discovery is a
//! synchronous check followed by a one-shot wait for the initialization
//! signal, bounded by `SessionPolicy::detection_timeout`. Whichever fires
//! first wins; a timeout means "not installed" and the caller falls back to a
//! deep link (mobile) or an install prompt (desktop).

use async_trait::async_trait;
use url::Url;

use crate::config::SessionPolicy;
use crate::deeplink;
use crate::error::ProviderError;
use crate::platform::Environment;
use crate::provider::ProviderHandle;

/// Where a provider may come from on the current page.
///
/// Implementations wrap the host's global scope: `current` reads whatever is
/// injected right now, `wait_for_initialization` resolves when the wallet
/// announces itself (or never, in which case the locator's timeout decides).
#[async_trait]
pub trait ProviderSource: Send + Sync {
    fn current(&self) -> Option<ProviderHandle>;

    async fn wait_for_initialization(&self) -> Option<ProviderHandle>;
}

/// Locator verdict, consumed via exhaustive matching.
#[derive(Clone)]
pub enum Located {
    /// A provider is available; connect in place.
    Ready { provider: ProviderHandle },
    /// Mobile external browser with no provider: redirect through the wallet
    /// app link so the page re-opens with a provider injected.
    NeedsDeepLink { url: String },
    /// Desktop with no provider: prompt for installation.
    NeedsInstall { url: String },
    /// Inside the wallet's own browser yet no provider appeared; a deep link
    /// cannot help here. Carries why discovery came up empty.
    Absent { cause: ProviderError },
}

impl std::fmt::Debug for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready { .. } => f.write_str("Ready"),
            Self::NeedsDeepLink { url } => f.debug_struct("NeedsDeepLink").field("url", url).finish(),
            Self::NeedsInstall { url } => f.debug_struct("NeedsInstall").field("url", url).finish(),
            Self::Absent { cause } => f.debug_struct("Absent").field("cause", cause).finish(),
        }
    }
}

/// Find a provider or decide the fallback strategy.
pub async fn locate(
    source: &dyn ProviderSource,
    env: Environment,
    page_url: &Url,
    policy: &SessionPolicy,
) -> Located {
    if let Some(provider) = source.current() {
        tracing::debug!(platform = env.platform.as_str(), "provider already injected");
        return Located::Ready { provider };
    }

    let waited = policy.detection_timeout;
    let cause = match tokio::time::timeout(waited, source.wait_for_initialization()).await {
        Ok(Some(provider)) => {
            tracing::debug!("provider initialized within the detection window");
            return Located::Ready { provider };
        }
        Ok(None) => ProviderError::Absent,
        Err(_) => ProviderError::DetectionTimeout { waited },
    };
    tracing::debug!(%cause, "no provider located");

    fallback(env, page_url, cause)
}

fn fallback(env: Environment, page_url: &Url, cause: ProviderError) -> Located {
    if env.in_wallet_browser {
        // The wallet browser injects synchronously; reaching this point means
        // something is broken on the wallet side.
        tracing::warn!("no provider inside the wallet's embedded browser");
        return Located::Absent { cause };
    }
    if env.platform.is_mobile() {
        return Located::NeedsDeepLink {
            url: deeplink::dapp_deep_link(page_url),
        };
    }
    Located::NeedsInstall {
        url: deeplink::install_url(env.platform).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Value;
    use tokio::sync::broadcast;

    use super::*;
    use crate::error::ProviderError;
    use crate::platform::Platform;
    use crate::provider::{Provider, ProviderEvent, RpcCall};

    struct NullProvider {
        events: broadcast::Sender<ProviderEvent>,
    }

    impl NullProvider {
        fn handle() -> ProviderHandle {
            let (events, _) = broadcast::channel(4);
            Arc::new(Self { events })
        }
    }

    #[async_trait]
    impl Provider for NullProvider {
        async fn request(&self, call: RpcCall) -> Result<Value, ProviderError> {
            Err(ProviderError::MalformedResponse {
                method: call.method,
                reason: "null provider".to_string(),
            })
        }

        fn events(&self) -> broadcast::Receiver<ProviderEvent> {
            self.events.subscribe()
        }
    }

    struct StubSource {
        injected: Option<ProviderHandle>,
        late: Option<ProviderHandle>,
        late_after: Duration,
    }

    #[async_trait]
    impl ProviderSource for StubSource {
        fn current(&self) -> Option<ProviderHandle> {
            self.injected.clone()
        }

        async fn wait_for_initialization(&self) -> Option<ProviderHandle> {
            tokio::time::sleep(self.late_after).await;
            self.late.clone()
        }
    }

    fn policy_with_timeout(ms: u64) -> SessionPolicy {
        SessionPolicy {
            detection_timeout: Duration::from_millis(ms),
            ..SessionPolicy::default()
        }
    }

    fn page() -> Url {
        Url::parse("https://dapp.example/").unwrap()
    }

    #[tokio::test]
    async fn synchronous_injection_wins_immediately() {
        let source = StubSource {
            injected: Some(NullProvider::handle()),
            late: None,
            late_after: Duration::from_secs(60),
        };
        let located = locate(&source, Environment::desktop(), &page(), &policy_with_timeout(1)).await;
        assert!(matches!(located, Located::Ready { .. }));
    }

    #[tokio::test]
    async fn late_injection_beats_the_timeout() {
        let source = StubSource {
            injected: None,
            late: Some(NullProvider::handle()),
            late_after: Duration::from_millis(5),
        };
        let located =
            locate(&source, Environment::desktop(), &page(), &policy_with_timeout(500)).await;
        assert!(matches!(located, Located::Ready { .. }));
    }

    #[tokio::test]
    async fn desktop_timeout_prompts_install() {
        let source = StubSource {
            injected: None,
            late: None,
            late_after: Duration::from_secs(60),
        };
        let located = locate(&source, Environment::desktop(), &page(), &policy_with_timeout(5)).await;
        match located {
            Located::NeedsInstall { url } => assert!(url.contains("metamask.io")),
            other => panic!("expected NeedsInstall, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mobile_timeout_redirects_via_deep_link() {
        let source = StubSource {
            injected: None,
            late: None,
            late_after: Duration::from_secs(60),
        };
        let env = Environment {
            platform: Platform::Android,
            in_wallet_browser: false,
        };
        let located = locate(&source, env, &page(), &policy_with_timeout(5)).await;
        match located {
            Located::NeedsDeepLink { url } => {
                assert!(url.starts_with("https://metamask.app.link/dapp/"));
                assert!(url.contains("dapp.example"));
            }
            other => panic!("expected NeedsDeepLink, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wallet_browser_without_provider_is_absent_with_a_timeout_cause() {
        let source = StubSource {
            injected: None,
            late: None,
            late_after: Duration::from_secs(60),
        };
        let env = Environment {
            platform: Platform::Ios,
            in_wallet_browser: true,
        };
        let located = locate(&source, env, &page(), &policy_with_timeout(5)).await;
        match located {
            Located::Absent { cause } => {
                assert!(matches!(cause, ProviderError::DetectionTimeout { .. }));
            }
            other => panic!("expected Absent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_initialization_signal_is_an_absent_cause() {
        let source = StubSource {
            injected: None,
            late: None,
            late_after: Duration::from_millis(1),
        };
        let env = Environment {
            platform: Platform::Android,
            in_wallet_browser: true,
        };
        let located = locate(&source, env, &page(), &policy_with_timeout(500)).await;
        match located {
            Located::Absent { cause } => assert!(matches!(cause, ProviderError::Absent)),
            other => panic!("expected Absent, got {other:?}"),
        }
    }
}
