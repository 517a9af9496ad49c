//! Sentinel tool for unresolvable names.
//!
//! Resolving an unknown name from model text must not fail the step; the
//! sentinel feeds a corrective notice back into the conversation instead.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::prompts;

use super::{Tool, ToolResponse};

/// Safe default for tool names the registry cannot resolve.
#[derive(Debug, Default)]
pub struct UnknownTool;

#[async_trait]
impl Tool for UnknownTool {
    fn name(&self) -> &str {
        "unknown"
    }

    async fn execute(&self, args: Value) -> Result<ToolResponse> {
        let requested = args
            .get("_requested_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        warn!(requested = %requested, "Unknown tool requested");
        Ok(ToolResponse::message(prompts::unknown_tool(requested)))
    }
}
