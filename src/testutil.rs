//! Scripted provider shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderEvent, RpcCall};

/// Provider double with per-method scripted responses and call accounting.
pub(crate) struct ScriptedProvider {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    delays: Mutex<HashMap<String, std::time::Duration>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<ProviderEvent>,
    known_wallet: bool,
    selected: Option<String>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            responses: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events,
            known_wallet: true,
            selected: None,
        }
    }

    /// Make a method's responses arrive after a delay, so tests can overlap
    /// concurrent callers deterministically.
    pub(crate) fn delay(&self, method: &str, delay: std::time::Duration) {
        self.delays.lock().unwrap().insert(method.to_string(), delay);
    }

    pub(crate) fn with_selected(mut self, address: &str) -> Self {
        self.selected = Some(address.to_string());
        self
    }

    pub(crate) fn script_ok(&self, method: &str, value: Value) {
        self.script(method, Ok(value));
    }

    pub(crate) fn script_err(&self, method: &str, code: i64, message: &str) {
        self.script(method, Err(ProviderError::rpc(code, message)));
    }

    pub(crate) fn script(&self, method: &str, result: Result<Value, ProviderError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    pub(crate) fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Params of the most recent call to `method`.
    pub(crate) fn last_call(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }

    pub(crate) fn emit(&self, event: ProviderEvent) {
        // Send only fails with no live subscribers, which some tests allow.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn request(&self, call: RpcCall) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((call.method.clone(), call.params.clone()));
        let delay = self.delays.lock().unwrap().get(&call.method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&call.method)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(result) => result,
            None => panic!("unscripted provider method: {}", call.method),
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn is_known_wallet(&self) -> bool {
        self.known_wallet
    }

    fn selected_address(&self) -> Option<String> {
        self.selected.clone()
    }
}
