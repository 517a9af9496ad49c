//! Terminal response tool.
//!
//! The model ends a task by requesting `respond` with its final answer;
//! the resulting `break_loop` terminates the message loop and the text
//! becomes the loop's terminal result.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::{Tool, ToolResponse};

/// Tool that returns the model's final answer and ends the loop.
pub struct RespondTool;

#[async_trait]
impl Tool for RespondTool {
    fn name(&self) -> &str {
        "respond"
    }

    async fn execute(&self, args: Value) -> Result<ToolResponse> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(ToolResponse::terminal(text))
    }
}
