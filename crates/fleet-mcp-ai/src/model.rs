//! The LanguageModel capability.

use async_trait::async_trait;

use fleet_mcp_core::error::FleetResult;

/// A model that completes a prompt with assistant text. Implementations
/// keep every vendor detail behind this seam.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, returning the assistant text.
    async fn complete(&self, prompt: &str) -> FleetResult<String>;

    /// Short human-readable identifier, used in health reports and logs.
    fn name(&self) -> &str;
}
