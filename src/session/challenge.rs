//! Challenge-signature gate.
//!
//! When the policy demands it, a session only counts once the active account
//! has signed a deterministic, human-readable challenge. The resulting record
//! is mirrored to the record store so it survives reloads. This layer never
//! verifies the signature cryptographically; that is a collaborator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ProviderError, StorageError};
use crate::provider::{Provider, RpcCall, decode_string, methods};
use crate::storage::RecordStore;

/// Fixed storage key for the persisted signature record.
pub const SIGNATURE_RECORD_KEY: &str = "walletgate.signature";

/// Proof of account control produced by the signature gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature: String,
    /// Unix timestamp embedded in the signed message.
    pub timestamp: i64,
    pub account: String,
}

/// Deterministic challenge text for a given origin and issue time.
pub fn challenge_message(origin: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{origin} wants you to sign in with your wallet account.\n\n\
         Issued At: {}\nNonce: {}",
        issued_at.to_rfc3339(),
        issued_at.timestamp()
    )
}

/// Ask the wallet to sign the challenge for `account`.
pub async fn request_signature(
    provider: &dyn Provider,
    account: &str,
    origin: &str,
    issued_at: DateTime<Utc>,
) -> Result<SignatureRecord, ProviderError> {
    let message = challenge_message(origin, issued_at);
    let value = provider
        .request(RpcCall::new(
            methods::PERSONAL_SIGN,
            json!([message, account]),
        ))
        .await?;
    let signature = decode_string(methods::PERSONAL_SIGN, value)?;

    Ok(SignatureRecord {
        signature,
        timestamp: issued_at.timestamp(),
        account: account.to_string(),
    })
}

/// Mirror the record to persistent storage (overwrites any previous one).
pub async fn persist_record(
    store: &dyn RecordStore,
    record: &SignatureRecord,
) -> Result<(), StorageError> {
    let value =
        serde_json::to_value(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(SIGNATURE_RECORD_KEY, &value).await
}

/// Load a previously persisted record, tolerating unreadable entries.
pub async fn load_record(store: &dyn RecordStore) -> Option<SignatureRecord> {
    let value = match store.get(SIGNATURE_RECORD_KEY).await {
        Ok(value) => value?,
        Err(error) => {
            tracing::warn!(%error, "failed to read persisted signature record");
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::warn!(%error, "persisted signature record is malformed, ignoring");
            None
        }
    }
}

/// Remove the persisted record.
pub async fn clear_record(store: &dyn RecordStore) -> Result<(), StorageError> {
    store.remove(SIGNATURE_RECORD_KEY).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStore;
    use crate::testutil::ScriptedProvider;

    fn issued() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn challenge_message_is_deterministic_and_readable() {
        let a = challenge_message("https://dapp.example", issued());
        let b = challenge_message("https://dapp.example", issued());
        assert_eq!(a, b);
        assert!(a.starts_with("https://dapp.example wants you to sign in"));
        assert!(a.contains("Issued At: 2023-11-14T22:13:20+00:00"));
        assert!(a.contains("Nonce: 1700000000"));
    }

    #[tokio::test]
    async fn signing_produces_a_record_for_the_account() {
        let provider = ScriptedProvider::new();
        provider.script_ok(methods::PERSONAL_SIGN, json!("0xsig"));

        let record = request_signature(&provider, "0xabc", "https://dapp.example", issued())
            .await
            .unwrap();
        assert_eq!(record.signature, "0xsig");
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.account, "0xabc");
    }

    #[tokio::test]
    async fn record_round_trips_through_the_store() {
        let store = MemoryStore::new();
        let record = SignatureRecord {
            signature: "0xfeed".to_string(),
            timestamp: 1_700_000_000,
            account: "0xabc".to_string(),
        };

        persist_record(&store, &record).await.unwrap();
        let loaded = load_record(&store).await.unwrap();
        assert_eq!(loaded, record);

        clear_record(&store).await.unwrap();
        assert!(load_record(&store).await.is_none());
    }

    #[tokio::test]
    async fn malformed_persisted_record_is_ignored() {
        let store = MemoryStore::new();
        store
            .set(SIGNATURE_RECORD_KEY, &json!({"signature": 42}))
            .await
            .unwrap();
        assert!(load_record(&store).await.is_none());
    }
}
