//! Minimal ERC-20 client over the wallet provider.
//!
//! Read calls go through `eth_call` against the latest block; `transfer` is
//! submitted with `eth_sendTransaction` so the wallet prompts for approval.
//! Calldata is ABI-encoded by hand since only three fixed selectors are
//! needed.

use primitive_types::U256;
use serde_json::json;

use crate::error::ProviderError;
use crate::provider::{ProviderHandle, RpcCall, decode_string, methods};

/// 4-byte selectors for the supported ERC-20 functions.
mod selectors {
    pub const BALANCE_OF: &str = "0x70a08231";
    pub const TOTAL_SUPPLY: &str = "0x18160ddd";
    pub const TRANSFER: &str = "0xa9059cbb";
}

/// Client bound to one token contract.
pub struct TokenClient {
    provider: ProviderHandle,
    contract: String,
}

impl TokenClient {
    pub fn new(provider: ProviderHandle, contract: impl Into<String>) -> Self {
        Self {
            provider,
            contract: contract.into(),
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Token balance of `account`, in base units.
    pub async fn balance_of(&self, account: &str) -> Result<U256, ProviderError> {
        let data = format!(
            "{}{}",
            selectors::BALANCE_OF,
            encode_address_word(account)?
        );
        let raw = self.eth_call(&data).await?;
        decode_u256_word(methods::ETH_CALL, &raw)
    }

    /// Total minted supply, in base units.
    pub async fn total_supply(&self) -> Result<U256, ProviderError> {
        let raw = self.eth_call(selectors::TOTAL_SUPPLY).await?;
        decode_u256_word(methods::ETH_CALL, &raw)
    }

    /// Submit a transfer from `from` to `to`; resolves to the transaction
    /// hash once the wallet approves and broadcasts it.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: U256,
    ) -> Result<String, ProviderError> {
        let data = format!(
            "{}{}{}",
            selectors::TRANSFER,
            encode_address_word(to)?,
            encode_u256_word(amount)
        );
        tracing::info!(%amount, to, "submitting token transfer");
        let value = self
            .provider
            .request(RpcCall::new(
                methods::ETH_SEND_TRANSACTION,
                json!([{ "from": from, "to": self.contract, "data": data }]),
            ))
            .await?;
        decode_string(methods::ETH_SEND_TRANSACTION, value)
    }

    async fn eth_call(&self, data: &str) -> Result<String, ProviderError> {
        let value = self
            .provider
            .request(RpcCall::new(
                methods::ETH_CALL,
                json!([{ "to": self.contract, "data": data }, "latest"]),
            ))
            .await?;
        decode_string(methods::ETH_CALL, value)
    }
}

/// Encode an address as a left-padded 32-byte word, without the 0x prefix.
fn encode_address_word(address: &str) -> Result<String, ProviderError> {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProviderError::MalformedResponse {
            method: methods::ETH_CALL.to_string(),
            reason: format!("'{address}' is not a 20-byte hex address"),
        });
    }
    Ok(format!("{:0>64}", hex.to_ascii_lowercase()))
}

/// Encode an amount as a 32-byte big-endian word, without the 0x prefix.
fn encode_u256_word(amount: U256) -> String {
    format!("{amount:064x}")
}

/// Decode a single 32-byte return word into a U256.
fn decode_u256_word(method: &str, raw: &str) -> Result<U256, ProviderError> {
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    if hex.is_empty() {
        return Err(ProviderError::MalformedResponse {
            method: method.to_string(),
            reason: "empty return data".to_string(),
        });
    }
    U256::from_str_radix(hex, 16).map_err(|e| ProviderError::MalformedResponse {
        method: method.to_string(),
        reason: format!("return data is not a uint256: {e}"),
    })
}
