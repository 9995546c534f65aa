//! Canonical connection state and the state machine that drives it.
//!
//! `WalletSession` is the single source of truth for the host UI. Only the
//! state machine and the event bridge mutate it; every mutation replaces the
//! whole state under one write lock, so readers never observe a partial
//! transition. Asynchronous completions carry the generation observed at
//! request start and become no-ops when a reset or shutdown has superseded
//! them in the meantime.

pub mod challenge;
pub mod disconnect;
pub mod events;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::SessionPolicy;
use crate::error::{FaultKind, SessionError, SessionFault};
use crate::network::{self, ChainOutcome, chain_ids_equal};
use crate::platform::Environment;
use crate::provider::{
    ProviderEvent, ProviderHandle, RpcCall, decode_accounts, decode_string, methods,
};
use crate::storage::RecordStore;

use self::challenge::SignatureRecord;
use self::disconnect::DisconnectOutcome;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    AwaitingNetworkSwitch,
    AwaitingSignature,
    Connected,
    /// Transient marker while a failed connect settles back to
    /// `Disconnected`; the fault itself outlives it in `last_error`.
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingNetworkSwitch => "awaiting_network_switch",
            Self::AwaitingSignature => "awaiting_signature",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

/// The complete connection-derived state for the current page lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletSession {
    /// Ordered account list; the first entry is the active account. Empty
    /// exactly when not connected.
    pub accounts: Vec<String>,
    /// Hex chain id as last reported by query or push event.
    pub chain_id: Option<String>,
    pub status: ConnectionStatus,
    /// True only when the provider self-identifies as the supported wallet.
    pub known_wallet: bool,
    /// Set when the wallet stayed on a chain other than the required one.
    pub wrong_network: bool,
    pub last_signature: Option<SignatureRecord>,
    /// Cleared on the next successful transition.
    pub last_error: Option<SessionFault>,
}

impl WalletSession {
    fn empty(known_wallet: bool) -> Self {
        Self {
            accounts: Vec::new(),
            chain_id: None,
            status: ConnectionStatus::Disconnected,
            known_wallet,
            wrong_network: false,
            last_signature: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn active_account(&self) -> Option<&str> {
        self.accounts.first().map(String::as_str)
    }
}

/// Owns the provider handle and drives all session transitions.
pub struct SessionManager {
    provider: ProviderHandle,
    environment: Environment,
    policy: SessionPolicy,
    store: Arc<dyn RecordStore>,
    state: RwLock<WalletSession>,
    /// Bumped on every reset/shutdown; stale completions compare against it.
    generation: AtomicU64,
    /// Completed connect attempts, used to share one outcome between
    /// concurrent callers.
    attempts: AtomicU64,
    /// Cleared on shutdown; nothing mutates state afterwards.
    active: AtomicBool,
    /// Serializes connect so only one account request is ever in flight.
    connect_gate: Mutex<()>,
    resumed: AtomicBool,
}

impl SessionManager {
    pub fn new(
        provider: ProviderHandle,
        environment: Environment,
        policy: SessionPolicy,
        store: Arc<dyn RecordStore>,
    ) -> Arc<Self> {
        let known_wallet = provider.is_known_wallet();
        Arc::new(Self {
            provider,
            environment,
            policy,
            store,
            state: RwLock::new(WalletSession::empty(known_wallet)),
            generation: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            active: AtomicBool::new(true),
            connect_gate: Mutex::new(()),
            resumed: AtomicBool::new(false),
        })
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub async fn snapshot(&self) -> WalletSession {
        self.state.read().await.clone()
    }

    fn active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Apply a whole-state mutation unless the session was reset or shut down
    /// after `gen` was captured. Returns whether it applied.
    async fn mutate(&self, r#gen: u64, apply: impl FnOnce(&mut WalletSession)) -> bool {
        if !self.active() {
            return false;
        }
        let mut state = self.state.write().await;
        if self.generation() != r#gen {
            return false;
        }
        apply(&mut state);
        true
    }

    /// Establish a session: request accounts, enforce the required chain,
    /// then (under policy) run the signature gate.
    ///
    /// Idempotent while an attempt is in flight: concurrent callers share the
    /// eventual outcome instead of issuing duplicate wallet prompts.
    pub async fn connect(&self) -> Result<WalletSession, SessionError> {
        if !self.active() {
            return Err(SessionError::Shutdown);
        }
        let entry_attempts = self.attempts.load(Ordering::SeqCst);
        let _gate = self.connect_gate.lock().await;

        let current = self.snapshot().await;
        if current.is_connected() {
            return Ok(current);
        }
        if self.attempts.load(Ordering::SeqCst) != entry_attempts {
            // Another caller's attempt completed while we waited on the gate;
            // report its outcome rather than prompting again.
            return match current.last_error {
                Some(fault) if fault.kind == FaultKind::UserRejected => {
                    Err(SessionError::ConnectRejected)
                }
                Some(fault) => Err(SessionError::Faulted(fault)),
                None => Err(SessionError::NotConnected),
            };
        }
        if !self.active() {
            return Err(SessionError::Shutdown);
        }

        let r#gen = self.generation();
        if !self
            .mutate(r#gen, |s| {
                s.status = ConnectionStatus::Connecting;
                s.last_error = None;
            })
            .await
        {
            return Err(SessionError::Shutdown);
        }

        tracing::info!("requesting wallet accounts");
        let requested = self
            .provider
            .request(RpcCall::bare(methods::ETH_REQUEST_ACCOUNTS))
            .await
            .and_then(|value| decode_accounts(methods::ETH_REQUEST_ACCOUNTS, value));
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let accounts = match requested {
            Ok(accounts) if !accounts.is_empty() => accounts,
            Ok(_) => {
                let fault =
                    SessionFault::new(FaultKind::UserRejected, "wallet returned no accounts");
                self.fail_connect(r#gen, fault).await;
                return Err(SessionError::ConnectRejected);
            }
            Err(error) => {
                tracing::warn!(%error, "wallet connection failed");
                let rejected = error.user_rejected();
                self.fail_connect(r#gen, SessionFault::from_provider(&error)).await;
                return Err(if rejected {
                    SessionError::ConnectRejected
                } else {
                    SessionError::Provider(error)
                });
            }
        };

        let adopted = accounts.clone();
        if !self
            .mutate(r#gen, move |s| {
                s.accounts = adopted;
                s.status = ConnectionStatus::AwaitingNetworkSwitch;
            })
            .await
        {
            return Err(SessionError::Shutdown);
        }

        self.enforce_network(r#gen).await?;

        if self.policy.require_signature {
            self.run_signature_gate(r#gen, &accounts[0]).await?;
        } else if !self
            .mutate(r#gen, |s| s.status = ConnectionStatus::Connected)
            .await
        {
            return Err(SessionError::Shutdown);
        }

        tracing::info!(account = %accounts[0], "wallet session connected");
        Ok(self.snapshot().await)
    }

    /// Silent adoption of an already-approved session. Runs once, at event
    /// bridge attach; never prompts the user.
    pub async fn resume(&self) {
        if self.resumed.swap(true, Ordering::SeqCst) || !self.active() {
            return;
        }
        let r#gen = self.generation();

        let accounts = match self.provider.selected_address() {
            Some(address) => vec![address],
            None => {
                let silent = self
                    .provider
                    .request(RpcCall::bare(methods::ETH_ACCOUNTS))
                    .await
                    .and_then(|value| decode_accounts(methods::ETH_ACCOUNTS, value));
                match silent {
                    Ok(accounts) => accounts,
                    Err(error) => {
                        tracing::debug!(%error, "silent account check failed");
                        return;
                    }
                }
            }
        };
        if accounts.is_empty() {
            return;
        }

        let record = challenge::load_record(self.store.as_ref())
            .await
            .filter(|r| r.account.eq_ignore_ascii_case(&accounts[0]));
        if self.policy.require_signature && record.is_none() {
            tracing::debug!("approved accounts present but challenge unsigned; not resuming");
            return;
        }

        let chain_id = self
            .provider
            .request(RpcCall::bare(methods::ETH_CHAIN_ID))
            .await
            .and_then(|value| decode_string(methods::ETH_CHAIN_ID, value))
            .ok();
        let required = self.policy.required_chain.chain_id.clone();

        let applied = self
            .mutate(r#gen, move |s| {
                s.wrong_network = chain_id
                    .as_deref()
                    .is_some_and(|id| !chain_ids_equal(id, &required));
                s.chain_id = chain_id;
                s.accounts = accounts;
                s.status = ConnectionStatus::Connected;
                s.last_signature = record;
                s.last_error = None;
            })
            .await;
        if applied {
            tracing::info!("resumed previously approved wallet session");
        }
    }

    /// Run the challenge-signature gate for the active account on demand.
    ///
    /// Used by hosts that connect without a signature policy and want proof
    /// of account control later. Rejection tears the session down the same
    /// way it does during a policy-gated connect.
    pub async fn sign_challenge(&self) -> Result<SignatureRecord, SessionError> {
        if !self.active() {
            return Err(SessionError::Shutdown);
        }
        let current = self.snapshot().await;
        let Some(account) = current.active_account().map(String::from) else {
            return Err(SessionError::NotConnected);
        };
        let r#gen = self.generation();
        self.run_signature_gate(r#gen, &account).await?;
        self.snapshot()
            .await
            .last_signature
            .ok_or(SessionError::Shutdown)
    }

    /// Tear the session down, platform-appropriately, and reset local state.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let outcome = if self.environment.platform.is_mobile() {
            disconnect::mobile_manual(&self.policy.deep_link)
        } else {
            disconnect::revoke_desktop(self.provider.as_ref()).await
        };
        self.full_reset(None).await;
        outcome
    }

    /// Stop all further mutation. Pending operations resolve as no-ops.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Atomic reset back to `Disconnected`: accounts, chain, and signature go
    /// together, and the persisted signature record is removed.
    pub(crate) async fn full_reset(&self, fault: Option<SessionFault>) {
        if !self.active() {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.write().await;
            let known = state.known_wallet;
            *state = WalletSession::empty(known);
            state.last_error = fault;
        }
        if let Err(error) = challenge::clear_record(self.store.as_ref()).await {
            tracing::warn!(%error, "failed to remove persisted signature record");
        }
    }

    /// Apply one provider push event. Events are authoritative: they always
    /// read the current state at application time.
    pub(crate) async fn apply_event(&self, event: ProviderEvent) {
        if !self.active() {
            return;
        }
        match event {
            ProviderEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                tracing::info!("wallet revoked account access");
                self.full_reset(None).await;
            }
            ProviderEvent::AccountsChanged(accounts) => {
                let r#gen = self.generation();
                self.mutate(r#gen, move |s| {
                    s.accounts = accounts;
                    s.status = ConnectionStatus::Connected;
                    s.last_error = None;
                })
                .await;
            }
            ProviderEvent::ChainChanged(chain_id) => {
                let required = self.policy.required_chain.chain_id.clone();
                let r#gen = self.generation();
                self.mutate(r#gen, move |s| {
                    s.wrong_network = !chain_ids_equal(&chain_id, &required);
                    s.chain_id = Some(chain_id);
                })
                .await;
            }
            ProviderEvent::Connect { chain_id } => {
                let r#gen = self.generation();
                self.mutate(r#gen, move |s| {
                    if let Some(id) = chain_id {
                        s.chain_id = Some(id);
                    }
                    if !s.accounts.is_empty() {
                        s.status = ConnectionStatus::Connected;
                        s.last_error = None;
                    }
                })
                .await;
            }
            ProviderEvent::Disconnect { reason } => {
                tracing::info!(
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "provider reported disconnect"
                );
                self.full_reset(None).await;
            }
        }
    }

    async fn enforce_network(&self, r#gen: u64) -> Result<(), SessionError> {
        let result =
            network::ensure_chain(self.provider.as_ref(), &self.policy.required_chain).await;
        let applied = match result {
            Ok(ChainOutcome::AlreadyCorrect | ChainOutcome::Switched) => {
                let required = self.policy.required_chain.chain_id.clone();
                self.mutate(r#gen, move |s| {
                    s.chain_id = Some(required);
                    s.wrong_network = false;
                })
                .await
            }
            Ok(ChainOutcome::ManualActionNeeded { observed, fault }) => {
                tracing::warn!(kind = fault.kind.as_str(), "continuing on wrong network");
                self.mutate(r#gen, move |s| {
                    if observed.is_some() {
                        s.chain_id = observed;
                    }
                    s.wrong_network = true;
                    s.last_error = Some(fault);
                })
                .await
            }
            Err(error) => {
                // Even a failed chain query is non-fatal; the session stays
                // usable, flagged wrong-network.
                tracing::warn!(%error, "chain enforcement failed");
                let fault = SessionFault::from_provider(&error);
                self.mutate(r#gen, move |s| {
                    s.wrong_network = true;
                    s.last_error = Some(fault);
                })
                .await
            }
        };
        if applied { Ok(()) } else { Err(SessionError::Shutdown) }
    }

    async fn run_signature_gate(&self, r#gen: u64, account: &str) -> Result<(), SessionError> {
        if !self
            .mutate(r#gen, |s| s.status = ConnectionStatus::AwaitingSignature)
            .await
        {
            return Err(SessionError::Shutdown);
        }

        let issued_at = Utc::now();
        let signed = challenge::request_signature(
            self.provider.as_ref(),
            account,
            &self.policy.origin,
            issued_at,
        )
        .await;

        match signed {
            Ok(record) => {
                if let Err(error) = challenge::persist_record(self.store.as_ref(), &record).await {
                    tracing::warn!(%error, "failed to persist signature record");
                }
                if !self
                    .mutate(r#gen, move |s| {
                        s.last_signature = Some(record);
                        s.status = ConnectionStatus::Connected;
                        s.last_error = None;
                    })
                    .await
                {
                    return Err(SessionError::Shutdown);
                }
                Ok(())
            }
            Err(error) if error.user_rejected() => {
                // An unsigned session is not a valid session under this
                // policy; demote all the way back down.
                tracing::info!("challenge signature declined");
                self.full_reset(Some(SessionFault::from_provider(&error))).await;
                Err(SessionError::ChallengeRejected)
            }
            Err(error) => {
                self.full_reset(Some(SessionFault::from_provider(&error))).await;
                Err(SessionError::Provider(error))
            }
        }
    }

    async fn fail_connect(&self, r#gen: u64, fault: SessionFault) {
        if !self
            .mutate(r#gen, move |s| {
                s.accounts.clear();
                s.status = ConnectionStatus::Error;
                s.last_error = Some(fault);
            })
            .await
        {
            return;
        }
        // The failure state is transient; settle at Disconnected with the
        // fault preserved until the next successful transition.
        self.mutate(r#gen, |s| s.status = ConnectionStatus::Disconnected)
            .await;
    }
}
