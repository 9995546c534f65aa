//! Wallet provider contract.
//!
//! The provider is the sole channel for all wallet operations: an opaque
//! request/event interface in the shape of EIP-1193. Everything above this
//! module treats the wallet as a remote signer and never assumes how the
//! transport is implemented.

pub mod locate;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::ProviderError;

/// RPC methods the session runtime issues.
pub mod methods {
    pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ETH_ACCOUNTS: &str = "eth_accounts";
    pub const ETH_CHAIN_ID: &str = "eth_chainId";
    pub const PERSONAL_SIGN: &str = "personal_sign";
    pub const WALLET_SWITCH_ETHEREUM_CHAIN: &str = "wallet_switchEthereumChain";
    pub const WALLET_ADD_ETHEREUM_CHAIN: &str = "wallet_addEthereumChain";
    pub const WALLET_REVOKE_PERMISSIONS: &str = "wallet_revokePermissions";
    pub const ETH_CALL: &str = "eth_call";
    pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
}

/// A single provider request.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub method: String,
    pub params: Value,
}

impl RpcCall {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Request with no parameters.
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Array(Vec::new()))
    }
}

/// Events the provider pushes for the lifetime of a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New account list; empty means the wallet revoked access.
    AccountsChanged(Vec<String>),
    /// Active chain changed (hex chain id).
    ChainChanged(String),
    /// Provider (re)gained connectivity.
    Connect { chain_id: Option<String> },
    /// Provider lost connectivity or the wallet ended the session.
    Disconnect { reason: Option<String> },
}

/// Wallet request/event interface.
///
/// `request` suspends until the wallet (and possibly the user) responds; only
/// the initial detection wait is ever bounded by a timeout. `events` hands out
/// an ordered feed; subscribers must apply events in delivery order.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(&self, call: RpcCall) -> Result<Value, ProviderError>;

    fn events(&self) -> broadcast::Receiver<ProviderEvent>;

    /// True only when the provider self-identifies as the supported wallet
    /// (the `isMetaMask` flag), not just any EIP-1193 object.
    fn is_known_wallet(&self) -> bool {
        false
    }

    /// Synchronously-known active address, when the wallet exposes one.
    fn selected_address(&self) -> Option<String> {
        None
    }
}

/// Shared, opaque reference to a located provider.
pub type ProviderHandle = Arc<dyn Provider>;

/// Decode an account-list response.
pub fn decode_accounts(method: &str, value: Value) -> Result<Vec<String>, ProviderError> {
    let entries = value
        .as_array()
        .ok_or_else(|| malformed(method, "expected an array of addresses"))?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(String::from)
                .ok_or_else(|| malformed(method, "expected string addresses"))
        })
        .collect()
}

/// Decode a plain string response (chain ids, signatures, tx hashes).
pub fn decode_string(method: &str, value: Value) -> Result<String, ProviderError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| malformed(method, "expected a string result"))
}

fn malformed(method: &str, reason: &str) -> ProviderError {
    ProviderError::MalformedResponse {
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_account_lists() {
        let accounts =
            decode_accounts(methods::ETH_ACCOUNTS, json!(["0xabc", "0xdef"])).unwrap();
        assert_eq!(accounts, vec!["0xabc", "0xdef"]);
        assert!(decode_accounts(methods::ETH_ACCOUNTS, json!([])).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_array_account_response() {
        let err = decode_accounts(methods::ETH_ACCOUNTS, json!("0xabc")).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn decodes_string_results() {
        assert_eq!(
            decode_string(methods::ETH_CHAIN_ID, json!("0x2761")).unwrap(),
            "0x2761"
        );
        assert!(decode_string(methods::ETH_CHAIN_ID, json!(42)).is_err());
    }

    #[test]
    fn bare_call_has_empty_params() {
        let call = RpcCall::bare(methods::ETH_CHAIN_ID);
        assert_eq!(call.method, "eth_chainId");
        assert_eq!(call.params, json!([]));
    }
}
