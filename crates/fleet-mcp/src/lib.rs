//! # fleet-mcp
//!
//! Multiplexing Model Context Protocol client and AI tool-chain control
//! plane.
//!
//! fleet-mcp manages a fleet of heterogeneous MCP servers (child processes
//! speaking LF-delimited JSON-RPC over stdio, and HTTP endpoints taking one
//! envelope per POST) behind a single asynchronous surface for listing
//! tools, invoking tools, reading resources, and observing notifications.
//! On top of that core sit an AI planning layer that turns free text into
//! dependency-ordered tool chains, per-endpoint rate limits and circuit
//! breakers, and a scheduled health monitor.
//!
//! ## Crates
//!
//! - `fleet-mcp-core`: wire codec, data model, errors, config, input validation
//! - `fleet-mcp-transport`: stdio and HTTP transports
//! - `fleet-mcp-client`: per-server connections and the client registry
//! - `fleet-mcp-resilience`: rate limiters and circuit breakers
//! - `fleet-mcp-ai`: LanguageModel capability, intent analysis, planner
//! - `fleet-mcp-orchestrator`: chain execution and conversation state
//! - `fleet-mcp-monitoring`: scheduled health probes
//!
//! ## Quick start
//!
//! ```no_run
//! use fleet_mcp::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> FleetResult<()> {
//!     let config = FleetConfig::load(std::path::Path::new("fleet.toml"))?;
//!     let fleet = Fleet::bootstrap(config).await?;
//!
//!     match fleet.chat("session-1", "list databases then their collections").await? {
//!         ChatResponse::Chain(result) => println!("{} steps succeeded", result.success_count),
//!         ChatResponse::Command(command) => println!("run: {command}"),
//!         ChatResponse::Help(reason) => println!("need input: {reason}"),
//!         ChatResponse::Unavailable(message) => println!("{message}"),
//!     }
//!
//!     fleet.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod prelude;

pub use app::{ChatResponse, Fleet};

// Re-export the layer crates under stable names.
pub use fleet_mcp_ai as ai;
pub use fleet_mcp_client as client;
pub use fleet_mcp_core as mcp_core;
pub use fleet_mcp_monitoring as monitoring;
pub use fleet_mcp_orchestrator as orchestrator;
pub use fleet_mcp_resilience as resilience;
pub use fleet_mcp_transport as transport;

/// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
