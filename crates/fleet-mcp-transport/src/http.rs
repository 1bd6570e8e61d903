//! Single-shot HTTP transport: each request envelope is one POST, the
//! response body is the response envelope.
//!
//! Servers reached this way have no notification channel; the stream
//! returned by `notifications()` is valid but never yields.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

use fleet_mcp_core::error::{FleetError, FleetResult};
use fleet_mcp_core::protocol::{JsonRpcRequest, JsonRpcResponse};

use crate::{Transport, NOTIFICATION_CAPACITY};

/// Transport over HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    notify_tx: broadcast::Sender<JsonRpcRequest>,
}

impl HttpTransport {
    /// Build a transport for `url`, appending `headers` verbatim to every
    /// request.
    pub fn new(url: &str, headers: &HashMap<String, String>) -> FleetResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FleetError::Transport(format!("failed to build HTTP client: {e}")))?;

        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FleetError::Validation(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FleetError::Validation(format!("invalid header value: {e}")))?;
            header_map.insert(name, value);
        }

        debug!(url, "created HTTP transport");

        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            client,
            url: url.to_string(),
            headers: header_map,
            notify_tx,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        request: JsonRpcRequest,
        timeout: Duration,
    ) -> FleetResult<JsonRpcResponse> {
        trace!(method = %request.method, url = %self.url, "HTTP request");

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FleetError::Timeout(timeout)
                } else {
                    FleetError::Transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Transport(format!(
                "HTTP status {status}: {body}"
            )));
        }

        response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| FleetError::Parse(format!("invalid response envelope: {e}")))
    }

    fn notifications(&self) -> BroadcastStream<JsonRpcRequest> {
        // Permanently empty, but subscribers get a well-formed stream.
        BroadcastStream::new(self.notify_tx.subscribe())
    }

    async fn close(&self) -> FleetResult<()> {
        debug!(url = %self.url, "HTTP transport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn configured_headers_are_applied() {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let transport = HttpTransport::new("http://127.0.0.1:9/mcp", &headers).unwrap();

        assert_eq!(transport.headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(
            transport.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let mut headers = HashMap::new();
        headers.insert("bad header name".to_string(), "v".to_string());
        let err = HttpTransport::new("http://127.0.0.1:9/mcp", &headers).unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn notification_stream_is_empty_but_alive() {
        let transport = HttpTransport::new("http://127.0.0.1:9/mcp", &HashMap::new()).unwrap();
        let mut stream = transport.notifications();

        let probe = tokio::time::timeout(std::time::Duration::from_millis(50), stream.next()).await;
        // No item arrives; the stream just stays pending.
        assert!(probe.is_err());
    }
}
