//! Configuration for walletgate.
//!
//! Policy is built programmatically with `Default` as the base layer; any
//! `WALLETGATE_*` environment variable overrides the corresponding field.
//! Invalid values fail loudly with the offending key and a parse hint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Full descriptor of the chain the application mandates.
///
/// Serialized shape matches the `wallet_addEthereumChain` parameter object
/// (EIP-3085), so the descriptor can be handed to the wallet verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Hex-encoded numeric chain id, `0x`-prefixed.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for ChainDescriptor {
    fn default() -> Self {
        Self {
            chain_id: "0x2761".to_string(),
            chain_name: "Japan Open Chain Testnet".to_string(),
            native_currency: NativeCurrency {
                name: "Japan Open Chain Testnet Token".to_string(),
                symbol: "JOCT".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc-1.testnet.japanopenchain.org:8545".to_string()],
            block_explorer_urls: vec!["https://explorer.testnet.japanopenchain.org".to_string()],
        }
    }
}

impl ChainDescriptor {
    /// Parameter object for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Timing policy for the mobile deep-link fallback race.
///
/// Modeled as policy rather than constants: the right fallback delay and
/// whether a focus change should cancel the store redirect differ per host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkPolicy {
    /// How long to wait for the app link to take over before redirecting to
    /// the platform store.
    pub store_fallback_delay: Duration,
    /// Cancel the pending store redirect when the page regains focus with a
    /// provider present.
    pub cancel_on_focus: bool,
    /// Open the wallet app after a mobile disconnect so the user can finish
    /// revoking there.
    pub open_wallet_on_disconnect: bool,
}

impl Default for DeepLinkPolicy {
    fn default() -> Self {
        Self {
            store_fallback_delay: Duration::from_secs(3),
            cancel_on_focus: true,
            open_wallet_on_disconnect: false,
        }
    }
}

/// Session policy consumed by the locator, enforcer, and state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub required_chain: ChainDescriptor,
    /// When set, a session is only valid once the active account has signed
    /// the challenge message.
    pub require_signature: bool,
    /// Bounded wait for delayed provider injection after page load.
    pub detection_timeout: Duration,
    pub deep_link: DeepLinkPolicy,
    /// Origin embedded in the challenge message.
    pub origin: String,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            required_chain: ChainDescriptor::default(),
            require_signature: false,
            detection_timeout: Duration::from_secs(3),
            deep_link: DeepLinkPolicy::default(),
            origin: "http://localhost:3000".to_string(),
        }
    }
}

impl SessionPolicy {
    /// Build policy from defaults with `WALLETGATE_*` env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut policy = Self::default();

        if let Some(raw) = optional_env("WALLETGATE_CHAIN_ID") {
            policy.required_chain.chain_id = normalize_chain_id(&raw, "WALLETGATE_CHAIN_ID")?;
        }
        if let Some(name) = optional_env("WALLETGATE_CHAIN_NAME") {
            policy.required_chain.chain_name = name;
        }
        if let Some(symbol) = optional_env("WALLETGATE_CURRENCY_SYMBOL") {
            policy.required_chain.native_currency.symbol = symbol;
        }
        if let Some(raw) = optional_env("WALLETGATE_CURRENCY_DECIMALS") {
            policy.required_chain.native_currency.decimals =
                parse_number(&raw, "WALLETGATE_CURRENCY_DECIMALS")?;
        }
        if let Some(raw) = optional_env("WALLETGATE_RPC_URLS") {
            policy.required_chain.rpc_urls = parse_url_list(&raw, "WALLETGATE_RPC_URLS")?;
        }
        if let Some(raw) = optional_env("WALLETGATE_EXPLORER_URLS") {
            policy.required_chain.block_explorer_urls =
                parse_url_list(&raw, "WALLETGATE_EXPLORER_URLS")?;
        }
        if let Some(raw) = optional_env("WALLETGATE_REQUIRE_SIGNATURE") {
            policy.require_signature = parse_bool(&raw, "WALLETGATE_REQUIRE_SIGNATURE")?;
        }
        if let Some(raw) = optional_env("WALLETGATE_DETECTION_TIMEOUT_MS") {
            policy.detection_timeout =
                Duration::from_millis(parse_number(&raw, "WALLETGATE_DETECTION_TIMEOUT_MS")?);
        }
        if let Some(raw) = optional_env("WALLETGATE_STORE_FALLBACK_DELAY_MS") {
            policy.deep_link.store_fallback_delay =
                Duration::from_millis(parse_number(&raw, "WALLETGATE_STORE_FALLBACK_DELAY_MS")?);
        }
        if let Some(raw) = optional_env("WALLETGATE_CANCEL_FALLBACK_ON_FOCUS") {
            policy.deep_link.cancel_on_focus =
                parse_bool(&raw, "WALLETGATE_CANCEL_FALLBACK_ON_FOCUS")?;
        }
        if let Some(origin) = optional_env("WALLETGATE_ORIGIN") {
            policy.origin = origin;
        }

        Ok(policy)
    }
}

/// Normalize a hex chain id: `0x`-prefixed, lowercase, non-empty digits.
pub fn normalize_chain_id(raw: &str, key: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected 0x-prefixed hex chain id, got '{raw}'"),
        })?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected hex digits after 0x, got '{raw}'"),
        });
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str, key: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean, got '{raw}'"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a number, got '{raw}'"),
    })
}

fn parse_url_list(raw: &str, key: &str) -> Result<Vec<String>, ConfigError> {
    let urls: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if urls.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "expected at least one URL".to_string(),
        });
    }
    for candidate in &urls {
        url::Url::parse(candidate).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{candidate}' is not a valid URL: {e}"),
        })?;
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_policy_targets_testnet_chain() {
        let policy = SessionPolicy::default();
        assert_eq!(policy.required_chain.chain_id, "0x2761");
        assert!(!policy.require_signature);
        assert_eq!(policy.detection_timeout, Duration::from_secs(3));
    }

    #[test]
    fn add_chain_params_use_wallet_field_names() {
        let params = ChainDescriptor::default().add_chain_params();
        assert_eq!(params["chainId"], "0x2761");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert!(params["rpcUrls"].is_array());
        assert!(params["blockExplorerUrls"].is_array());
    }

    #[test]
    fn chain_id_normalization_lowercases_and_validates() {
        assert_eq!(normalize_chain_id("0X2761", "k").unwrap(), "0x2761");
        assert_eq!(normalize_chain_id("0xAB", "k").unwrap(), "0xab");
        assert!(normalize_chain_id("2761", "k").is_err());
        assert!(normalize_chain_id("0x", "k").is_err());
        assert!(normalize_chain_id("0xzz", "k").is_err());
    }

    #[test]
    fn bool_parsing_rejects_garbage() {
        assert!(parse_bool("yes", "k").unwrap());
        assert!(!parse_bool("off", "k").unwrap());
        assert!(parse_bool("maybe", "k").is_err());
    }

    #[test]
    fn url_list_parsing_splits_and_validates() {
        let urls = parse_url_list("https://a.example, https://b.example", "k").unwrap();
        assert_eq!(urls.len(), 2);
        assert!(parse_url_list("not a url", "k").is_err());
        assert!(parse_url_list(" , ", "k").is_err());
    }
}
