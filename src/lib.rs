//! walletgate: session runtime for EIP-1193 wallet providers.
//!
//! The crate turns a raw injected-provider interface into a supervised wallet
//! session: it classifies the runtime platform, locates (or deep-links to) the
//! wallet, drives the connect flow through network enforcement and an optional
//! signature gate, and keeps the resulting session state synchronized with
//! provider push events for the lifetime of the page.
//!
//! Typical wiring:
//!
//! ```ignore
//! let policy = SessionPolicy::from_env()?;
//! let env = platform::detect(&user_agent);
//! match provider::locate::locate(&source, env, &page_url, &policy).await {
//!     Located::Ready { provider } => {
//!         let store = Arc::new(FileStore::new(FileStore::default_root()));
//!         let manager = SessionManager::new(provider, env, policy, store);
//!         let bridge = EventBridge::attach(manager.clone());
//!         let session = manager.connect().await?;
//!         // ...
//!         bridge.detach().await;
//!     }
//!     Located::NeedsDeepLink { url } => { /* hand off to the wallet app */ }
//!     Located::NeedsInstall { url } => { /* send the user to the store */ }
//!     Located::Absent { cause } => { /* no wallet available */ }
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod deeplink;
pub mod error;
pub mod network;
pub mod platform;
pub mod provider;
pub mod session;
pub mod storage;
pub mod token;

#[cfg(test)]
mod testutil;

pub use config::{ChainDescriptor, DeepLinkPolicy, SessionPolicy};
pub use error::{Error, FaultKind, ProviderError, Result, SessionError, SessionFault};
pub use network::ChainOutcome;
pub use platform::{Environment, Platform};
pub use provider::locate::{Located, ProviderSource};
pub use provider::{Provider, ProviderEvent, ProviderHandle, RpcCall};
pub use session::disconnect::DisconnectOutcome;
pub use session::events::EventBridge;
pub use session::{ConnectionStatus, SessionManager, WalletSession};
pub use storage::{FileStore, MemoryStore, RecordStore};
pub use token::TokenClient;
