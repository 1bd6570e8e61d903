//! Input screening applied before any language-model call.

pub mod input;

pub use input::{
    is_high_risk, sanitize, validate, validate_context_id, MAX_CONTEXT_ID_CHARS, MAX_INPUT_CHARS,
};
