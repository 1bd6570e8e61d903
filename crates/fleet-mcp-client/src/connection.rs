//! One long-lived logical channel to a single MCP server.
//!
//! Wraps a transport with request-id allocation, the initialize handshake,
//! the health ping, typed tool/resource operations and notification
//! fan-out. Per-request failures are returned as values; neither a timeout
//! nor a transport fault poisons the connection.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use fleet_mcp_core::config::{ClientDefaults, ServerDescriptor};
use fleet_mcp_core::error::{FleetError, FleetResult};
use fleet_mcp_core::protocol::{methods, JsonRpcRequest, RequestId, PROTOCOL_VERSION};
use fleet_mcp_core::types::{
    ClientInfo, InitializeRequest, ListResourcesResponse, ListToolsResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceContent, ServerInfo, Tool, ToolCallRequest,
    ToolCallResponse,
};
use fleet_mcp_transport::{create_transport, Transport};

/// Deadline for the health ping, independent of the per-request timeout.
const PING_DEADLINE: Duration = Duration::from_secs(5);

/// Connection to one MCP server.
pub struct McpConnection {
    server_id: String,
    transport: Box<dyn Transport>,
    /// Monotonic id counter; ids are consumed even for failed requests so
    /// they are never reused.
    next_id: AtomicI64,
    timeout: Duration,
    server_info: RwLock<Option<ServerInfo>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("server_id", &self.server_id)
            .field("timeout", &self.timeout)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl McpConnection {
    /// Build the transport for `descriptor`, run the initialize handshake
    /// and return a ready connection. On handshake failure the transport is
    /// torn down and an `initialization` error is surfaced.
    pub async fn establish(
        server_id: impl Into<String>,
        descriptor: &ServerDescriptor,
        defaults: &ClientDefaults,
        client_info: ClientInfo,
    ) -> FleetResult<Self> {
        let server_id = server_id.into();
        let transport = create_transport(descriptor)?;

        let connection = Self {
            server_id: server_id.clone(),
            transport,
            next_id: AtomicI64::new(1),
            timeout: descriptor.timeout(defaults),
            server_info: RwLock::new(None),
            closed: AtomicBool::new(false),
        };

        if let Err(e) = connection.initialize(client_info).await {
            let _ = connection.transport.close().await;
            return Err(FleetError::Initialization(format!(
                "server '{server_id}': {e}"
            )));
        }

        Ok(connection)
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Identity the server reported during initialize.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    async fn initialize(&self, client_info: ClientInfo) -> FleetResult<()> {
        let params = serde_json::to_value(InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info,
        })?;

        let result = self.request(methods::INITIALIZE, Some(params)).await?;
        let info: ServerInfo = serde_json::from_value(result)
            .map_err(|e| FleetError::Parse(format!("invalid initialize result: {e}")))?;

        info!(
            server_id = %self.server_id,
            server = %info.name,
            version = %info.version,
            "initialized MCP server"
        );
        *self.server_info.write().await = Some(info);
        Ok(())
    }

    /// Issue a request with the connection's configured timeout.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> FleetResult<serde_json::Value> {
        self.request_with_timeout(method, params, self.timeout).await
    }

    async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> FleetResult<serde_json::Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FleetError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(method, params, Some(RequestId::Number(id)));

        let response = self.transport.request(request, timeout).await?;
        if let Some(error) = &response.error {
            return Err(FleetError::from_json_rpc(error));
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Health probe: a `ping` answered without an error field within five
    /// seconds.
    pub async fn is_healthy(&self) -> bool {
        match self
            .request_with_timeout(methods::PING, None, PING_DEADLINE)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(server_id = %self.server_id, error = %e, "ping failed");
                false
            }
        }
    }

    pub async fn list_tools(&self) -> FleetResult<Vec<Tool>> {
        let result = self.request(methods::TOOLS_LIST, None).await?;
        let response: ListToolsResponse = serde_json::from_value(result)
            .map_err(|e| FleetError::Parse(format!("invalid tools/list result: {e}")))?;
        Ok(response.tools)
    }

    /// Invoke a tool. Every failure (server-side error, timeout, transport
    /// fault) is mapped into a result with the error flag set, keeping the
    /// plan executor uniform.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> ToolCallResponse {
        let params = match serde_json::to_value(ToolCallRequest {
            name: name.to_string(),
            arguments,
        }) {
            Ok(params) => params,
            Err(e) => return ToolCallResponse::error(format!("invalid tool arguments: {e}")),
        };

        match self.request(methods::TOOLS_CALL, Some(params)).await {
            Ok(result) => serde_json::from_value(result).unwrap_or_else(|e| {
                ToolCallResponse::error(format!("invalid tools/call result: {e}"))
            }),
            Err(e) => {
                warn!(server_id = %self.server_id, tool = name, error = %e, "tool call failed");
                ToolCallResponse::error(format!("tool '{name}' failed: {e}"))
            }
        }
    }

    pub async fn list_resources(&self) -> FleetResult<Vec<Resource>> {
        let result = self.request(methods::RESOURCES_LIST, None).await?;
        let response: ListResourcesResponse = serde_json::from_value(result)
            .map_err(|e| FleetError::Parse(format!("invalid resources/list result: {e}")))?;
        Ok(response.resources)
    }

    pub async fn read_resource(&self, uri: &str) -> FleetResult<Vec<ResourceContent>> {
        let params = serde_json::to_value(ReadResourceRequest {
            uri: uri.to_string(),
        })?;
        let result = self.request(methods::RESOURCES_READ, Some(params)).await?;
        let response: ReadResourceResponse = serde_json::from_value(result)
            .map_err(|e| FleetError::Parse(format!("invalid resources/read result: {e}")))?;
        Ok(response.contents)
    }

    /// Subscribe to server notifications from this point on. Every
    /// subscriber sees every subsequent notification.
    pub fn notifications(&self) -> BroadcastStream<JsonRpcRequest> {
        self.transport.notifications()
    }

    /// Cancel pending requests and release the transport. Idempotent.
    pub async fn close(&self) -> FleetResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(server_id = %self.server_id, "closing connection");
        self.transport.close().await
    }
}
