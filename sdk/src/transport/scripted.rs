//! In-memory transport answering each method from a queue of canned results.
//! The last queued result of a method is repeated once the queue drains.

use super::{JsonRpcRequest, JsonRpcResponse, Transport};
use crate::errors::SdkResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<(String, Instant, Vec<Value>)>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn script(self, method: &str, results: Vec<Value>) -> Self {
        self.scripts
            .lock()
            .insert(method.to_string(), results.into_iter().collect());
        self
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _, _)| m == method).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Start instants of every call to `method`.
    pub(crate) fn started_at(&self, method: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _, _)| m == method)
            .map(|(_, at, _)| *at)
            .collect()
    }

    pub(crate) fn params(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _, _)| m == method)
            .map(|(_, _, params)| params.clone())
            .collect()
    }

    fn next(&self, method: &str) -> Option<Value> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(method)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &JsonRpcRequest) -> SdkResult<JsonRpcResponse> {
        self.calls.lock().push((
            request.method.clone(),
            Instant::now(),
            request.params.clone(),
        ));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        Ok(match self.next(&request.method) {
            Some(result) => JsonRpcResponse::success(request.id.clone(), result),
            None => JsonRpcResponse::failure(request.id.clone(), -32601, "Method not found"),
        })
    }
}
