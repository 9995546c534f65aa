//! Bridge between provider push events and the session state machine.
//!
//! Subscribes before the silent resume probe runs, so an event racing the
//! probe is never lost. Events are applied strictly in arrival order on one
//! task; the state machine's generation guard handles everything else.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::SessionManager;
use crate::provider::ProviderEvent;

/// Owns the background task that feeds provider events into the manager.
///
/// Detaching is idempotent; dropping an attached bridge aborts the task.
pub struct EventBridge {
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
}

impl EventBridge {
    /// Subscribe to the manager's provider and start applying events.
    pub fn attach(manager: Arc<SessionManager>) -> Self {
        let (stop, stopped) = watch::channel(false);
        let receiver = manager.provider().events();
        let handle = tokio::spawn(run(manager, receiver, stopped));
        Self {
            handle: std::sync::Mutex::new(Some(handle)),
            stop,
        }
    }

    /// Stop the feed and wait for the task to finish draining.
    pub async fn detach(&self) {
        let _ = self.stop.send(true);
        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle
            && let Err(error) = handle.await
            && !error.is_cancelled()
        {
            tracing::warn!(%error, "event bridge task failed");
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handle.lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
        }
    }
}

async fn run(
    manager: Arc<SessionManager>,
    mut events: broadcast::Receiver<ProviderEvent>,
    mut stopped: watch::Receiver<bool>,
) {
    // Adopt any pre-approved session before processing live events.
    manager.resume().await;

    loop {
        tokio::select! {
            biased;

            changed = stopped.changed() => {
                if changed.is_err() || *stopped.borrow() {
                    tracing::debug!("event bridge stopping");
                    return;
                }
            }
            received = events.recv() => match received {
                Ok(event) => manager.apply_event(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Skipped events are stale snapshots; the next one
                    // carries the current truth.
                    tracing::warn!(missed, "event feed lagged, continuing");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("provider event feed closed");
                    return;
                }
            },
        }
    }
}
