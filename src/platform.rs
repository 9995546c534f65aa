//! Runtime platform classification.
//!
//! Pure functions over the user-agent string: no globals, no side effects,
//! fully deterministic given their inputs. The rest of the crate consumes the
//! closed `Platform` variant via exhaustive matching instead of scattered
//! boolean checks.

use serde::{Deserialize, Serialize};

/// Host platform the dapp is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Desktop,
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}

/// Classified runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub platform: Platform,
    /// True when the page runs inside the wallet's own embedded browser,
    /// where a provider is always injected and deep links are pointless.
    pub in_wallet_browser: bool,
}

impl Environment {
    pub fn desktop() -> Self {
        Self {
            platform: Platform::Desktop,
            in_wallet_browser: false,
        }
    }
}

/// User-agent marker the wallet's embedded mobile browser appends.
const IN_WALLET_MARKER: &str = "metamaskmobile";

/// Classify the runtime from a user-agent string.
pub fn detect(user_agent: &str) -> Environment {
    let ua = user_agent.to_ascii_lowercase();

    let platform = if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        Platform::Ios
    } else if ua.contains("android") {
        Platform::Android
    } else {
        Platform::Desktop
    };

    Environment {
        platform,
        in_wallet_browser: ua.contains(IN_WALLET_MARKER),
    }
}
