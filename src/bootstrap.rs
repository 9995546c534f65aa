//! Process bootstrap: env-file loading and tracing initialization.
//!
//! Env vars load from two dotenv layers, `./.env` first and then
//! `~/.walletgate/.env`, so the effective priority is:
//!
//!   explicit env vars > `./.env` > `~/.walletgate/.env`
//!
//! dotenvy never overwrites vars that are already set, which is what makes
//! that ordering hold.

use std::path::PathBuf;

/// Path to the user-level env file: `~/.walletgate/.env`.
pub fn walletgate_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".walletgate")
        .join(".env")
}

/// Load `./.env` and then `~/.walletgate/.env`.
pub fn load_env() {
    let _ = dotenvy::dotenv();
    let path = walletgate_env_path();
    if path.exists() {
        let _ = dotenvy::from_path(&path);
    }
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_path_lives_under_the_home_directory() {
        let path = walletgate_env_path();
        assert!(path.ends_with(".walletgate/.env"));
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
