//! Tool trait: one callable function exposed to the model.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ToolDefinition, ToolResult};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool with already-parsed JSON arguments.
    ///
    /// Expected failures (validation, degraded side effects) come back as
    /// `Ok(ToolResult { ok: false, .. })`; `Err` is reserved for the
    /// unexpected and is mapped by the registry.
    async fn execute(&self, arguments: &serde_json::Value) -> Result<ToolResult>;
}
