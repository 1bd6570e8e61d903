//! # fleet-mcp-transport
//!
//! Transport layer for fleet-mcp: one capability, two implementations.
//!
//! A [`Transport`] sends a request envelope and yields its response
//! envelope, and exposes a lazy stream of server-initiated notifications.
//! The stdio variant spawns the configured child process and speaks
//! LF-delimited JSON over its pipes; the HTTP variant posts each envelope
//! as a single request. The construction-time branch on the descriptor in
//! [`create_transport`] is the only place that looks at the transport type.

use async_trait::async_trait;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;

use fleet_mcp_core::config::{ServerDescriptor, ServerEndpoint};
use fleet_mcp_core::error::FleetResult;
use fleet_mcp_core::protocol::{JsonRpcRequest, JsonRpcResponse};

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// Capacity of the notification fan-out. A lagging subscriber drops the
/// oldest items; there is no replay.
pub(crate) const NOTIFICATION_CAPACITY: usize = 256;

/// One logical channel to an MCP server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request envelope and wait for its response envelope, at most
    /// `timeout`. A deadline failure leaves the transport usable.
    async fn request(
        &self,
        request: JsonRpcRequest,
        timeout: Duration,
    ) -> FleetResult<JsonRpcResponse>;

    /// Subscribe to server notifications from this point on.
    fn notifications(&self) -> BroadcastStream<JsonRpcRequest>;

    /// Release all transport resources. Pending requests fail with
    /// `connection-closed`. Idempotent.
    async fn close(&self) -> FleetResult<()>;
}

/// Build the transport for a descriptor.
pub fn create_transport(descriptor: &ServerDescriptor) -> FleetResult<Box<dyn Transport>> {
    match &descriptor.endpoint {
        ServerEndpoint::Stdio {
            command,
            args,
            environment,
        } => {
            let transport = StdioTransport::spawn(command, args, environment)?;
            Ok(Box::new(transport))
        }
        ServerEndpoint::Http { url, headers } => {
            let transport = HttpTransport::new(url, headers)?;
            Ok(Box::new(transport))
        }
    }
}
