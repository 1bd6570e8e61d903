//! Tool-execution plans produced by the planner and consumed by the chain
//! orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FleetError, FleetResult};
use crate::types::tools::ToolCallResponse;

/// One step of a plan.
///
/// Step numbers start at 1 and are strictly increasing; `step_N` is the
/// step's id in substitution tokens and dependency lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    /// 1-based step number
    pub step: u32,

    /// Target tool name
    pub action: String,

    /// Target server id; empty means "use the conversation's preferred
    /// server"
    #[serde(default)]
    pub server: String,

    /// Parameter map; string values may carry `${step_N.path}` tokens
    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default)]
    pub reasoning: String,

    /// A failing critical step halts the chain
    #[serde(default)]
    pub critical: bool,

    /// Explicit dependencies as `step_N` ids; references inferred from
    /// substitution tokens are merged in at execution time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl PlanStep {
    /// The step's id in `step_N` form.
    pub fn id(&self) -> String {
        format!("step_{}", self.step)
    }
}

/// Parse a `step_N` id back to its number.
pub fn parse_step_id(id: &str) -> Option<u32> {
    id.strip_prefix("step_")?.parse().ok()
}

/// Ordered, dependency-linked list of tool invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolPlan {
    #[serde(default)]
    pub analysis: String,

    #[serde(default)]
    pub expected_outcome: String,

    pub steps: Vec<PlanStep>,
}

impl ToolPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            analysis: String::new(),
            expected_outcome: String::new(),
            steps,
        }
    }

    /// Structural invariants: step numbers strictly increasing from 1,
    /// dependencies only referring to earlier steps.
    pub fn validate(&self) -> FleetResult<()> {
        if self.steps.is_empty() {
            return Err(FleetError::Planning("plan has no steps".to_string()));
        }
        let mut expected = 1u32;
        for step in &self.steps {
            if step.step != expected {
                return Err(FleetError::Planning(format!(
                    "step numbers must increase from 1, found {} where {} was expected",
                    step.step, expected
                )));
            }
            if step.action.is_empty() {
                return Err(FleetError::Planning(format!(
                    "step {} has no action",
                    step.step
                )));
            }
            for dep in &step.depends_on {
                match parse_step_id(dep) {
                    Some(n) if n < step.step => {}
                    Some(n) => {
                        return Err(FleetError::Dependency(format!(
                            "step {} depends on step {n}, which is not an earlier step",
                            step.step
                        )));
                    }
                    None => {
                        return Err(FleetError::Dependency(format!(
                            "step {} has malformed dependency id '{dep}'",
                            step.step
                        )));
                    }
                }
            }
            expected += 1;
        }
        Ok(())
    }
}

/// Outcome of one executed (or skipped) plan step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed { result: ToolCallResponse },
    Failed { kind: String, message: String },
    Skipped { reason: String },
}

/// Reference to the originating step plus its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step: u32,
    pub action: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        match &self.outcome {
            StepOutcome::Completed { result } => !result.is_failure(),
            _ => false,
        }
    }

    pub fn skipped(&self) -> bool {
        matches!(self.outcome, StepOutcome::Skipped { .. })
    }
}
