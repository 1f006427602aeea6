//! The interface between the agent loop and the functions the model can call.

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::AbacusError;
use crate::provider::ToolDefinition;

/// A function the model may call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in its tool calls.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &AgentToolParameters;

    /// Run an approved call. An error aborts the run instead of being
    /// reported back to the model.
    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, AbacusError>;

    /// Definition advertised to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}
