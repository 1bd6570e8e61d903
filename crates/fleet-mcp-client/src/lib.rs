//! # fleet-mcp-client
//!
//! The multiplexing heart of fleet-mcp: [`McpConnection`] is one logical
//! channel to an MCP server (id allocation, initialize handshake, typed
//! operations, notification fan-out); [`ClientRegistry`] owns the fleet of
//! connections and exposes aggregated queries over all of them.

pub mod connection;
pub mod registry;

pub use connection::McpConnection;
pub use registry::ClientRegistry;
