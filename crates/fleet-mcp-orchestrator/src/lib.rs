//! # fleet-mcp-orchestrator
//!
//! Executes planner output: dependency-ordered tool chains with parameter
//! substitution from earlier results, criticality handling, resilience
//! gating, and the in-memory conversation store feeding context into runs.

pub mod conversation;
pub mod executor;
pub mod substitution;

pub use conversation::{
    ConversationContext, ConversationMessage, ConversationStore, MessageRole, DEFAULT_IDLE_TTL,
    DEFAULT_SWEEP_INTERVAL, MAX_MESSAGES,
};
pub use executor::{ChainExecutionResult, ChainOrchestrator, ToolInvoker};
pub use substitution::{navigate, referenced_steps, substitute};
