//! MCP protocol layer: JSON-RPC envelopes and protocol constants.

pub mod constants;
pub mod jsonrpc;

pub use constants::{methods, JSONRPC_VERSION, PROTOCOL_VERSION};
pub use jsonrpc::{
    error_codes, validate_message, JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
