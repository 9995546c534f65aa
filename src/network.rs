//! Required-chain enforcement.
//!
//! Query first: if the wallet is already on the required chain, no switch
//! request is ever issued. Otherwise switch, and on the unrecognized-chain
//! code (4902) add the chain with its full descriptor; many wallets activate
//! a freshly added chain automatically, so the outcome is verified and the
//! switch re-issued at most once before giving up. Failures here are never
//! fatal: the session stays connected, flagged wrong-network.

use serde_json::json;

use crate::config::ChainDescriptor;
use crate::error::{FaultKind, ProviderError, SessionFault};
use crate::provider::{Provider, RpcCall, decode_string, methods};

/// Result of `ensure_chain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Already on the required chain; zero switch/add requests issued.
    AlreadyCorrect,
    /// The wallet is now on the required chain.
    Switched,
    /// The wallet stayed on another chain; the user has to act in the wallet.
    ManualActionNeeded {
        observed: Option<String>,
        fault: SessionFault,
    },
}

impl ChainOutcome {
    pub fn on_required_chain(&self) -> bool {
        matches!(self, Self::AlreadyCorrect | Self::Switched)
    }
}

/// Compare two hex chain ids numerically (`0x1` == `0x01`).
pub fn chain_ids_equal(a: &str, b: &str) -> bool {
    fn digits(id: &str) -> Option<String> {
        let rest = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))?
            .trim_start_matches('0')
            .to_ascii_lowercase();
        Some(rest)
    }
    matches!((digits(a), digits(b)), (Some(x), Some(y)) if x == y)
}

/// Bring the wallet onto the required chain, or report why it stayed put.
pub async fn ensure_chain(
    provider: &dyn Provider,
    chain: &ChainDescriptor,
) -> Result<ChainOutcome, ProviderError> {
    let current = query_chain_id(provider).await?;
    if chain_ids_equal(&current, &chain.chain_id) {
        return Ok(ChainOutcome::AlreadyCorrect);
    }

    tracing::info!(
        current = %current,
        required = %chain.chain_id,
        "wallet on wrong chain, requesting switch"
    );

    match request_switch(provider, &chain.chain_id).await {
        Ok(()) => Ok(ChainOutcome::Switched),
        Err(err) if err.unrecognized_chain() => add_then_switch(provider, chain, current).await,
        Err(err) => Ok(manual(Some(current), &err)),
    }
}

async fn add_then_switch(
    provider: &dyn Provider,
    chain: &ChainDescriptor,
    previously_observed: String,
) -> Result<ChainOutcome, ProviderError> {
    tracing::info!(chain = %chain.chain_id, "chain unknown to wallet, requesting add");

    if let Err(err) = provider
        .request(RpcCall::new(
            methods::WALLET_ADD_ETHEREUM_CHAIN,
            json!([chain.add_chain_params()]),
        ))
        .await
    {
        return Ok(manual(Some(previously_observed), &err));
    }

    // Most wallets activate the chain they just added; verify before
    // re-issuing the switch.
    let observed = query_chain_id(provider).await?;
    if chain_ids_equal(&observed, &chain.chain_id) {
        return Ok(ChainOutcome::Switched);
    }

    match request_switch(provider, &chain.chain_id).await {
        Ok(()) => Ok(ChainOutcome::Switched),
        Err(err) => Ok(manual(Some(observed), &err)),
    }
}

async fn query_chain_id(provider: &dyn Provider) -> Result<String, ProviderError> {
    let value = provider.request(RpcCall::bare(methods::ETH_CHAIN_ID)).await?;
    decode_string(methods::ETH_CHAIN_ID, value)
}

async fn request_switch(provider: &dyn Provider, chain_id: &str) -> Result<(), ProviderError> {
    provider
        .request(RpcCall::new(
            methods::WALLET_SWITCH_ETHEREUM_CHAIN,
            json!([{ "chainId": chain_id }]),
        ))
        .await
        .map(|_| ())
}

fn manual(observed: Option<String>, error: &ProviderError) -> ChainOutcome {
    let mut fault = SessionFault::from_provider(error);
    // A declined or failed switch leaves the session usable; surface it as a
    // wrong-network condition unless it was an explicit rejection.
    if fault.kind != FaultKind::UserRejected {
        fault.kind = FaultKind::WrongNetwork;
    }
    ChainOutcome::ManualActionNeeded { observed, fault }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::codes;
    use crate::testutil::ScriptedProvider;

    fn chain() -> ChainDescriptor {
        ChainDescriptor::default()
    }

    #[test]
    fn chain_id_comparison_is_numeric() {
        assert!(chain_ids_equal("0x2761", "0x2761"));
        assert!(chain_ids_equal("0x01", "0x1"));
        assert!(chain_ids_equal("0xAB", "0xab"));
        assert!(!chain_ids_equal("0x1", "0x2"));
        assert!(!chain_ids_equal("2761", "0x2761"));
    }

    #[tokio::test]
    async fn already_correct_issues_no_switch() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x2761"));

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        assert_eq!(outcome, ChainOutcome::AlreadyCorrect);
        assert_eq!(provider.call_count(methods::WALLET_SWITCH_ETHEREUM_CHAIN), 0);
        assert_eq!(provider.call_count(methods::WALLET_ADD_ETHEREUM_CHAIN), 0);
    }

    #[tokio::test]
    async fn switches_when_on_another_chain() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_ok(methods::WALLET_SWITCH_ETHEREUM_CHAIN, json!(null));

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        assert_eq!(outcome, ChainOutcome::Switched);
        assert_eq!(provider.call_count(methods::WALLET_SWITCH_ETHEREUM_CHAIN), 1);
    }

    #[tokio::test]
    async fn unrecognized_chain_triggers_exactly_one_add() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_err(
            methods::WALLET_SWITCH_ETHEREUM_CHAIN,
            codes::UNRECOGNIZED_CHAIN,
            "Unrecognized chain ID.",
        );
        provider.script_ok(methods::WALLET_ADD_ETHEREUM_CHAIN, json!(null));
        // Wallet auto-activated the added chain.
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x2761"));

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        assert_eq!(outcome, ChainOutcome::Switched);
        assert_eq!(provider.call_count(methods::WALLET_ADD_ETHEREUM_CHAIN), 1);
        assert_eq!(provider.call_count(methods::WALLET_SWITCH_ETHEREUM_CHAIN), 1);
    }

    #[tokio::test]
    async fn add_without_auto_activation_retries_switch_once() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_err(
            methods::WALLET_SWITCH_ETHEREUM_CHAIN,
            codes::UNRECOGNIZED_CHAIN,
            "Unrecognized chain ID.",
        );
        provider.script_ok(methods::WALLET_ADD_ETHEREUM_CHAIN, json!(null));
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_ok(methods::WALLET_SWITCH_ETHEREUM_CHAIN, json!(null));

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        assert_eq!(outcome, ChainOutcome::Switched);
        assert_eq!(provider.call_count(methods::WALLET_SWITCH_ETHEREUM_CHAIN), 2);
    }

    #[tokio::test]
    async fn declined_switch_is_non_fatal() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_err(
            methods::WALLET_SWITCH_ETHEREUM_CHAIN,
            codes::USER_REJECTED,
            "User rejected the request.",
        );

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        match outcome {
            ChainOutcome::ManualActionNeeded { observed, fault } => {
                assert_eq!(observed.as_deref(), Some("0x1"));
                assert_eq!(fault.kind, FaultKind::UserRejected);
            }
            other => panic!("expected ManualActionNeeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn declined_add_reports_wrong_network() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::ETH_CHAIN_ID, json!("0x1"));
        provider.script_err(
            methods::WALLET_SWITCH_ETHEREUM_CHAIN,
            codes::UNRECOGNIZED_CHAIN,
            "Unrecognized chain ID.",
        );
        provider.script_err(
            methods::WALLET_ADD_ETHEREUM_CHAIN,
            -32000,
            "Request failed.",
        );

        let outcome = ensure_chain(&provider, &chain()).await.unwrap();
        match outcome {
            ChainOutcome::ManualActionNeeded { fault, .. } => {
                assert_eq!(fault.kind, FaultKind::WrongNetwork);
            }
            other => panic!("expected ManualActionNeeded, got {other:?}"),
        }
    }
}
