//! Convenience imports for fleet-mcp applications.

pub use crate::app::{ChatResponse, Fleet};
pub use crate::init_tracing;

pub use fleet_mcp_core::config::{FleetConfig, ServerDescriptor, ServerEndpoint};
pub use fleet_mcp_core::error::{FleetError, FleetResult};
pub use fleet_mcp_core::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use fleet_mcp_core::types::{
    Resource, ResourceContent, ServerInfo, StepOutcome, StepResult, Tool, ToolCallResponse,
    ToolCatalog, ToolContent, ToolPlan,
};

pub use fleet_mcp_client::{ClientRegistry, McpConnection};
pub use fleet_mcp_transport::{create_transport, HttpTransport, StdioTransport, Transport};

pub use fleet_mcp_resilience::{
    endpoints, CircuitState, ResilienceRegistry, ResilienceStatus,
};

pub use fleet_mcp_ai::{
    GenerativeModel, GenerativeModelConfig, Intent, IntentKind, LanguageModel, ModelTier,
    PatternModel, Planner, PlannerOutcome,
};

pub use fleet_mcp_orchestrator::{
    ChainExecutionResult, ChainOrchestrator, ConversationContext, ConversationStore, MessageRole,
    ToolInvoker,
};

pub use fleet_mcp_monitoring::{
    HealthIndicator, HealthMonitor, HealthReport, HealthStatus, MonitorSchedule, SystemStatus,
};
