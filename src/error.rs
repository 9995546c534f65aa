//! Error types for walletgate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level error type for the session runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// JSON-RPC error codes wallets are known to return.
pub mod codes {
    /// EIP-1193: the user rejected the request in the wallet.
    pub const USER_REJECTED: i64 = 4001;
    /// EIP-3085/3326: the requested chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// JSON-RPC: the provider does not implement the method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },
}

/// Errors raised by the wallet provider transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("No injected wallet provider is reachable")]
    Absent,

    #[error("Provider detection timed out after {waited:?}")]
    DetectionTimeout { waited: Duration },

    #[error("Malformed provider response for {method}: {reason}")]
    MalformedResponse { method: String, reason: String },
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// True when the wallet reported that the user declined the request.
    pub fn user_rejected(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == codes::USER_REJECTED)
    }

    /// True when the wallet does not know the requested chain (triggers add-chain).
    pub fn unrecognized_chain(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == codes::UNRECOGNIZED_CHAIN)
    }

    /// True when the provider does not implement the method at all.
    pub fn method_not_found(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == codes::METHOD_NOT_FOUND)
    }
}

/// Session command errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connection rejected in the wallet")]
    ConnectRejected,

    #[error("Signature challenge rejected in the wallet")]
    ChallengeRejected,

    #[error("No active account; connect first")]
    NotConnected,

    #[error("Session was shut down before the operation completed")]
    Shutdown,

    #[error("{}", .0.message)]
    Faulted(SessionFault),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Persistent-record store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Classified fault kinds mirrored onto `WalletSession::last_error`.
///
/// Nothing here is fatal to the host; the worst outcome any fault drives is a
/// full reset back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    UserRejected,
    UnrecognizedChain,
    ProviderAbsent,
    ProviderTimeout,
    WrongNetwork,
    RevokeUnsupported,
    /// Catch-all for transport faults with no more specific classification.
    ProviderFailure,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::UnrecognizedChain => "unrecognized_chain",
            Self::ProviderAbsent => "provider_absent",
            Self::ProviderTimeout => "provider_timeout",
            Self::WrongNetwork => "wrong_network",
            Self::RevokeUnsupported => "revoke_unsupported",
            Self::ProviderFailure => "provider_failure",
        }
    }
}

/// User-facing fault record; cleared on the next successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFault {
    pub kind: FaultKind,
    pub message: String,
}

impl SessionFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a provider error into the session fault taxonomy.
    pub fn from_provider(error: &ProviderError) -> Self {
        let kind = match error {
            ProviderError::Rpc { code, .. } if *code == codes::USER_REJECTED => {
                FaultKind::UserRejected
            }
            ProviderError::Rpc { code, .. } if *code == codes::UNRECOGNIZED_CHAIN => {
                FaultKind::UnrecognizedChain
            }
            ProviderError::Rpc { code, .. } if *code == codes::METHOD_NOT_FOUND => {
                FaultKind::RevokeUnsupported
            }
            ProviderError::Absent => FaultKind::ProviderAbsent,
            ProviderError::DetectionTimeout { .. } => FaultKind::ProviderTimeout,
            _ => FaultKind::ProviderFailure,
        };
        Self::new(kind, error.to_string())
    }
}

/// Result type alias for the session runtime.
pub type Result<T> = std::result::Result<T, Error>;
