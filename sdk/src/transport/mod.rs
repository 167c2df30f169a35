/// JSON-RPC transports
///
/// A transport is a pure envelope and correlation layer: it sends one
/// request and hands back the response carrying the same id. `http` is the
/// single-shot transport, `websocket` the persistent multiplexed one.
pub mod http;
pub mod websocket;

#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpTransport;
pub use websocket::WebSocketTransport;

use crate::errors::{SdkError, SdkResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// JSON-RPC request structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Build a request with a fresh unique id.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<Value>, result: Value) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result,
            error: None,
        }
    }

    pub fn failure(id: impl Into<Value>, code: i64, message: impl Into<String>) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: Value::Null,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// The id as a correlation key. Numeric ids are compared by their text.
    pub fn id_key(&self) -> Option<String> {
        match &self.id {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// The `result`, or the `error` field surfaced as an `RpcError`.
    pub fn into_result(self, method: &str) -> SdkResult<Value> {
        match self.error {
            Some(error) => Err(SdkError::RpcError {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one request and wait for its correlated response.
    async fn send(&self, request: &JsonRpcRequest) -> SdkResult<JsonRpcResponse>;

    /// Release any held connection.
    async fn close(&self) -> SdkResult<()> {
        Ok(())
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> SdkResult<Value> {
        let request = JsonRpcRequest::new(method, params);
        self.send(&request).await?.into_result(method)
    }
}

/// Pick a transport from the endpoint scheme: `http(s)` is single-shot,
/// `ws(s)` keeps a persistent connection.
pub fn connect(endpoint: &str, timeout: Duration) -> SdkResult<Arc<dyn Transport>> {
    let url = Url::parse(endpoint)
        .map_err(|e| SdkError::format(endpoint, format!("invalid endpoint URL ({})", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(Arc::new(HttpTransport::new(endpoint, timeout)?)),
        "ws" | "wss" => Ok(Arc::new(WebSocketTransport::new(endpoint, timeout))),
        other => Err(SdkError::format(
            endpoint,
            format!("unsupported endpoint scheme '{}'", other),
        )),
    }
}
