//! # fleet-mcp-core
//!
//! Core layer of the fleet-mcp workspace: the JSON-RPC 2.0 wire codec, the
//! MCP data model (tools, resources, server identity, tool plans), the
//! shared error taxonomy, the configuration surface, and the user-input
//! validator.
//!
//! Everything here is transport- and runtime-agnostic; the async machinery
//! lives in the transport, client and orchestration crates.

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;
pub mod validation;

pub use config::{AiConfig, ClientDefaults, FleetConfig, McpConfig, ServerDescriptor, ServerEndpoint};
pub use error::{FleetError, FleetResult};
pub use protocol::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use types::{
    PlanStep, Resource, ResourceContent, ServerInfo, StepOutcome, StepResult, Tool,
    ToolCallRequest, ToolCallResponse, ToolCatalog, ToolContent, ToolPlan,
};
