//! Platform-specific session teardown.
//!
//! Desktop providers can be asked to revoke the dapp's account permission;
//! when the method is missing the local reset still proceeds, because the
//! wallet keeps its own authorization record either way. Mobile has no
//! reliable programmatic revoke, so the coordinator resets locally and hands
//! the user instructions (optionally opening the wallet app via its app link).

use serde_json::json;

use crate::config::DeepLinkPolicy;
use crate::deeplink;
use crate::provider::{Provider, RpcCall, methods};

/// What the teardown path achieved beyond the unconditional local reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Desktop: the provider revoked the account permission.
    Revoked,
    /// Desktop: revocation is not supported (or failed); only local state was
    /// reset. A known limitation, not an error.
    RevokeUnsupported,
    /// Mobile: local reset done; the user finishes inside the wallet app.
    MobileManual {
        instructions: String,
        wallet_link: Option<String>,
    },
}

/// Desktop path: ask the provider to revoke the `eth_accounts` permission.
pub async fn revoke_desktop(provider: &dyn Provider) -> DisconnectOutcome {
    let result = provider
        .request(RpcCall::new(
            methods::WALLET_REVOKE_PERMISSIONS,
            json!([{ "eth_accounts": {} }]),
        ))
        .await;

    match result {
        Ok(_) => {
            tracing::info!("wallet permission revoked");
            DisconnectOutcome::Revoked
        }
        Err(error) if error.method_not_found() => {
            tracing::debug!("provider does not implement permission revocation");
            DisconnectOutcome::RevokeUnsupported
        }
        Err(error) => {
            tracing::warn!(%error, "permission revocation failed, resetting locally");
            DisconnectOutcome::RevokeUnsupported
        }
    }
}

/// Mobile path: instructions plus an optional hop into the wallet app.
pub fn mobile_manual(policy: &DeepLinkPolicy) -> DisconnectOutcome {
    let wallet_link = policy.open_wallet_on_disconnect.then(|| {
        let link = deeplink::WALLET_APP_LINK.to_string();
        deeplink::open_external(&link);
        link
    });

    DisconnectOutcome::MobileManual {
        instructions: "Disconnected from this site. To fully revoke access, open your wallet \
                       app and remove this site under connected sites."
            .to_string(),
        wallet_link,
    }
}
