//! Dependency-ordered execution of a tool plan.
//!
//! Steps run in plan order, which respects declared dependencies by
//! construction once the plan validates. Each invocation passes the
//! resilience gates (tool-execution permit, MCP circuit), and its outcome
//! is reported back to the breaker. A failing critical step halts the
//! chain; later steps are recorded as skipped.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use fleet_mcp_core::error::FleetResult;
use fleet_mcp_core::types::{StepOutcome, StepResult, ToolCallResponse, ToolContent, ToolPlan};
use fleet_mcp_client::ClientRegistry;
use fleet_mcp_resilience::{endpoints, ResilienceRegistry};

use crate::conversation::ConversationContext;
use crate::substitution;

/// Capability the executor uses to reach tools. The registry is the
/// production implementation; tests inject mocks.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `tool` on `server_id`; failures come back as flagged results.
    async fn invoke(&self, server_id: &str, tool: &str, arguments: Value) -> ToolCallResponse;
}

#[async_trait]
impl ToolInvoker for ClientRegistry {
    async fn invoke(&self, server_id: &str, tool: &str, arguments: Value) -> ToolCallResponse {
        self.call_tool(server_id, tool, Some(arguments)).await
    }
}

/// Aggregate outcome of one chain run.
#[derive(Debug, Clone, Serialize)]
pub struct ChainExecutionResult {
    pub results: Vec<StepResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// True iff every step that ran succeeded
    pub successful: bool,
}

/// Executes plans through the registry behind the resilience gates.
pub struct ChainOrchestrator {
    invoker: Arc<dyn ToolInvoker>,
    resilience: Arc<ResilienceRegistry>,
}

impl ChainOrchestrator {
    pub fn new(invoker: Arc<dyn ToolInvoker>, resilience: Arc<ResilienceRegistry>) -> Self {
        Self { invoker, resilience }
    }

    /// Run `plan` to completion. The conversation context supplies the
    /// target server for steps that leave it blank.
    pub async fn execute(
        &self,
        plan: &ToolPlan,
        context: Option<&ConversationContext>,
    ) -> FleetResult<ChainExecutionResult> {
        plan.validate()?;

        let mut results_by_step: HashMap<u32, Value> = HashMap::new();
        let mut step_results: Vec<StepResult> = Vec::with_capacity(plan.steps.len());
        let mut halted_by: Option<u32> = None;

        for step in &plan.steps {
            if let Some(failed_step) = halted_by {
                step_results.push(StepResult {
                    step: step.step,
                    action: step.action.clone(),
                    outcome: StepOutcome::Skipped {
                        reason: format!("critical step {failed_step} failed"),
                    },
                });
                continue;
            }

            let outcome = self
                .execute_step(step, context, &mut results_by_step)
                .await;

            let failed = !matches!(
                &outcome,
                StepOutcome::Completed { result } if !result.is_failure()
            );
            if failed && step.critical {
                warn!(step = step.step, "critical step failed, halting chain");
                halted_by = Some(step.step);
            }

            step_results.push(StepResult {
                step: step.step,
                action: step.action.clone(),
                outcome,
            });
        }

        let success_count = step_results.iter().filter(|r| r.succeeded()).count();
        let skipped_count = step_results.iter().filter(|r| r.skipped()).count();
        let failure_count = step_results.len() - success_count - skipped_count;

        let result = ChainExecutionResult {
            successful: failure_count == 0,
            results: step_results,
            success_count,
            failure_count,
            skipped_count,
        };
        info!(
            steps = plan.steps.len(),
            succeeded = result.success_count,
            failed = result.failure_count,
            skipped = result.skipped_count,
            "chain complete"
        );
        Ok(result)
    }

    async fn execute_step(
        &self,
        step: &fleet_mcp_core::types::PlanStep,
        context: Option<&ConversationContext>,
        results_by_step: &mut HashMap<u32, Value>,
    ) -> StepOutcome {
        let server = if step.server.is_empty() {
            match context.and_then(|ctx| ctx.preferred_server.clone()) {
                Some(server) => server,
                None => {
                    return StepOutcome::Failed {
                        kind: "planning".to_string(),
                        message: format!("step {} names no target server", step.step),
                    };
                }
            }
        } else {
            step.server.clone()
        };

        // Dependencies inferred from substitution tokens must point
        // backwards, like declared ones.
        let references = substitution::referenced_steps(&step.parameters);
        if references.iter().any(|referenced| *referenced >= step.step) {
            return StepOutcome::Failed {
                kind: "dependency".to_string(),
                message: format!(
                    "step {} references the result of a step that has not run",
                    step.step
                ),
            };
        }

        let arguments = substitution::substitute(&step.parameters, results_by_step);
        debug!(step = step.step, tool = %step.action, %server, "executing step");

        // Tool-execution permit, then the shared MCP circuit.
        if let Err(e) = self.resilience.acquire(endpoints::TOOL_EXECUTIONS).await {
            return StepOutcome::Failed {
                kind: e.kind().to_string(),
                message: e.to_string(),
            };
        }
        if let Err(e) = self.resilience.acquire(endpoints::MCP).await {
            return StepOutcome::Failed {
                kind: e.kind().to_string(),
                message: e.to_string(),
            };
        }

        let result = self
            .invoker
            .invoke(&server, &step.action, Value::Object(arguments))
            .await;

        if result.is_failure() {
            self.resilience.record_failure(endpoints::MCP).await;
        } else {
            self.resilience.record_success(endpoints::MCP).await;
            results_by_step.insert(step.step, result_value(&result));
        }
        StepOutcome::Completed { result }
    }
}

/// The value later steps navigate into: the first structured-data item,
/// else the first text item (parsed as JSON when possible), else the
/// serialized result.
fn result_value(result: &ToolCallResponse) -> Value {
    for item in &result.content {
        if let ToolContent::Data { data, .. } = item {
            return data.clone();
        }
    }
    for item in &result.content {
        if let ToolContent::Text { text } = item {
            return serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()));
        }
    }
    serde_json::to_value(result).unwrap_or(Value::Null)
}
