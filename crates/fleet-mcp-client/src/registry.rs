//! Owner of the server-id → connection map.
//!
//! Startup initializes every enabled server concurrently; a failing server
//! is logged and dropped without aborting the rest. Aggregate queries fan
//! out with per-connection isolation. The registry guarantees close is
//! called exactly once per connection during shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use fleet_mcp_core::config::{ClientDefaults, ServerDescriptor};
use fleet_mcp_core::error::{FleetError, FleetResult};
use fleet_mcp_core::types::{ClientInfo, ToolCallResponse, ToolCatalog};

use crate::connection::McpConnection;

/// Process-scoped registry of MCP connections.
pub struct ClientRegistry {
    connections: RwLock<HashMap<String, Arc<McpConnection>>>,
    defaults: ClientDefaults,
    client_info: ClientInfo,
}

impl ClientRegistry {
    pub fn new(defaults: ClientDefaults) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            defaults,
            client_info: ClientInfo::default(),
        }
    }

    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    /// Connect and initialize every enabled descriptor concurrently.
    /// Returns the number of servers that came up.
    pub async fn startup(&self, servers: &HashMap<String, ServerDescriptor>) -> usize {
        let attempts = servers
            .iter()
            .filter(|(_, descriptor)| descriptor.enabled)
            .map(|(id, descriptor)| {
                let id = id.clone();
                let client_info = self.client_info.clone();
                async move {
                    let result =
                        McpConnection::establish(&id, descriptor, &self.defaults, client_info)
                            .await;
                    (id, result)
                }
            });

        let mut connected = 0;
        for (id, result) in futures::future::join_all(attempts).await {
            match result {
                Ok(connection) => {
                    self.connections
                        .write()
                        .await
                        .insert(id, Arc::new(connection));
                    connected += 1;
                }
                Err(e) => warn!(server_id = %id, error = %e, "server failed to start, skipping"),
            }
        }

        info!(connected, total = servers.len(), "registry startup complete");
        connected
    }

    /// Look up a connection by server id.
    pub async fn get(&self, server_id: &str) -> FleetResult<Arc<McpConnection>> {
        self.connections
            .read()
            .await
            .get(server_id)
            .cloned()
            .ok_or_else(|| FleetError::InvalidRequest(format!("unknown server id '{server_id}'")))
    }

    pub async fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.connections.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Connect a new server at runtime. Fails if the id is taken.
    pub async fn add(&self, server_id: &str, descriptor: &ServerDescriptor) -> FleetResult<()> {
        if self.connections.read().await.contains_key(server_id) {
            return Err(FleetError::InvalidRequest(format!(
                "server id '{server_id}' already registered"
            )));
        }

        let connection = McpConnection::establish(
            server_id,
            descriptor,
            &self.defaults,
            self.client_info.clone(),
        )
        .await?;

        let mut connections = self.connections.write().await;
        if connections.contains_key(server_id) {
            // Someone raced us; keep the existing connection.
            let _ = connection.close().await;
            return Err(FleetError::InvalidRequest(format!(
                "server id '{server_id}' already registered"
            )));
        }
        connections.insert(server_id.to_string(), Arc::new(connection));
        info!(server_id, "server added");
        Ok(())
    }

    /// Close and forget a server.
    pub async fn remove(&self, server_id: &str) -> FleetResult<()> {
        let connection = self.connections.write().await.remove(server_id);
        match connection {
            Some(connection) => {
                connection.close().await?;
                info!(server_id, "server removed");
                Ok(())
            }
            None => Err(FleetError::InvalidRequest(format!(
                "unknown server id '{server_id}'"
            ))),
        }
    }

    /// Invoke a tool on a named server. Unknown servers produce a flagged
    /// tool result like any other failure.
    pub async fn call_tool(
        &self,
        server_id: &str,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> ToolCallResponse {
        match self.get(server_id).await {
            Ok(connection) => connection.call_tool(name, arguments).await,
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    /// Snapshot of every server's tools. A server that fails to answer
    /// contributes an empty slot rather than failing the aggregate.
    pub async fn all_tools(&self) -> ToolCatalog {
        let connections = self.snapshot().await;
        let probes = connections.into_iter().map(|(id, connection)| async move {
            let tools = match connection.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(server_id = %id, error = %e, "tools/list failed");
                    Vec::new()
                }
            };
            (id, tools)
        });
        futures::future::join_all(probes).await.into_iter().collect()
    }

    /// Per-server health, isolated: an unhealthy server reports `false`
    /// without affecting the rest.
    pub async fn overall_health(&self) -> HashMap<String, bool> {
        let connections = self.snapshot().await;
        let probes = connections.into_iter().map(|(id, connection)| async move {
            let healthy = connection.is_healthy().await;
            (id, healthy)
        });
        futures::future::join_all(probes).await.into_iter().collect()
    }

    /// Close every connection exactly once and clear the map.
    pub async fn shutdown(&self) {
        let connections: Vec<(String, Arc<McpConnection>)> =
            self.connections.write().await.drain().collect();
        for (id, connection) in connections {
            if let Err(e) = connection.close().await {
                warn!(server_id = %id, error = %e, "error closing connection");
            }
        }
        info!("registry shut down");
    }

    async fn snapshot(&self) -> Vec<(String, Arc<McpConnection>)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, connection)| (id.clone(), connection.clone()))
            .collect()
    }
}
