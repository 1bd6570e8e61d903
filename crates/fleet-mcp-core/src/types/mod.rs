//! Data model shared across the workspace.

pub mod plan;
pub mod resources;
pub mod server;
pub mod tools;

pub use plan::{parse_step_id, PlanStep, StepOutcome, StepResult, ToolPlan};
pub use resources::{
    ListResourcesResponse, ReadResourceRequest, ReadResourceResponse, Resource, ResourceContent,
};
pub use server::{ClientInfo, InitializeRequest, ServerInfo};
pub use tools::{ListToolsResponse, Tool, ToolCallRequest, ToolCallResponse, ToolCatalog, ToolContent};
