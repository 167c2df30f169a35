use super::{JsonRpcRequest, JsonRpcResponse, Transport};
use crate::errors::{SdkError, SdkResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Single-shot transport: one POST per request, awaited to completion.
pub struct HttpTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SdkResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SdkError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(HttpTransport {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &JsonRpcRequest) -> SdkResult<JsonRpcResponse> {
        log::debug!("HTTP request {} id={}", request.method, request.id);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SdkError::Timeout(format!(
                        "{} did not answer within {} ms",
                        request.method,
                        self.timeout.as_millis()
                    ))
                } else {
                    SdkError::NetworkError(format!("HTTP request {} failed: {}", request.method, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(SdkError::NetworkError(format!(
                "HTTP error from {}: {}",
                request.method,
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SdkError::Timeout(format!(
                    "{} response body not received within {} ms",
                    request.method,
                    self.timeout.as_millis()
                ))
            } else {
                SdkError::InvalidResponse(format!(
                    "Failed to parse response to {}: {}",
                    request.method, e
                ))
            }
        })?;

        if rpc_response.id_key().as_deref() != Some(request.id.as_str()) {
            log::warn!(
                "Response id {} does not match request id {} for {}",
                rpc_response.id,
                request.id,
                request.method
            );
        }

        Ok(rpc_response)
    }
}
