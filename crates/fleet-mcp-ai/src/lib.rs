//! # fleet-mcp-ai
//!
//! The natural-language layer: a narrow [`LanguageModel`] capability with a
//! remote generative implementation and a deterministic pattern fallback, a
//! model-tier selector, intent analysis, and the planner that turns free
//! text into direct commands or dependency-linked tool plans.

pub mod fallback;
pub mod generative;
pub mod intent;
pub mod model;
pub mod planner;
pub mod selector;

pub use fallback::PatternModel;
pub use generative::{GenerativeModel, GenerativeModelConfig};
pub use intent::{analyze, is_multi_step, Intent, IntentKind};
pub use model::LanguageModel;
pub use planner::{is_direct_command, validate_command, Planner, PlannerOutcome, HELP_NEEDED_MARKER};
pub use selector::{select_tier, ModelTier};
