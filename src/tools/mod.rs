//! Tool capability layer.
//!
//! Tools are the actions a model can request by emitting a JSON object
//! (`{"tool_name": ..., "tool_args": {...}}`) in its response text. This
//! module provides:
//!
//! - The [`Tool`] trait: before/execute/after lifecycle over JSON args
//! - [`ToolInvocation`]: the parsed request extracted from model text
//! - [`ToolResponse`]: a tool's result, optionally terminating the loop
//! - [`ToolRegistry`]: validated name → implementation lookup with an
//!   unknown-tool fallback
//! - The dispatcher driving the lifecycle with intervention checkpoints

pub mod dispatcher;
pub mod parse;
mod registry;
pub mod respond;
pub mod unknown;

pub use registry::ToolRegistry;
pub use respond::RespondTool;
pub use unknown::UnknownTool;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A parsed tool request extracted from free-form model text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Requested tool name. May be empty or unknown; resolution falls
    /// back to the sentinel unknown tool rather than failing.
    pub tool_name: String,
    /// Arguments object passed to the tool.
    pub tool_args: Value,
}

/// A tool's result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    /// Text fed back into the conversation (or returned as the final
    /// answer when `break_loop` is set).
    pub message: String,
    /// Whether the enclosing loop should terminate and return `message`
    /// as its terminal result.
    pub break_loop: bool,
}

impl ToolResponse {
    /// A result that continues the loop.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            break_loop: false,
        }
    }

    /// A terminal result that ends the loop.
    pub fn terminal(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            break_loop: true,
        }
    }
}

/// Trait that all tools must implement.
///
/// The dispatcher drives `before_execution` → `execute` →
/// `after_execution`, with an intervention checkpoint between every
/// stage. `before_execution` and `after_execution` default to no-ops.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses to request this tool. Unique within a
    /// registry.
    fn name(&self) -> &str;

    /// Hook run before `execute` (argument validation, setup).
    async fn before_execution(&self, _args: &Value) -> Result<()> {
        Ok(())
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolResponse>;

    /// Hook run after `execute` (cleanup, logging).
    async fn after_execution(&self, _response: &ToolResponse) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_response_constructors() {
        let cont = ToolResponse::message("keep going");
        assert!(!cont.break_loop);
        let done = ToolResponse::terminal("the answer");
        assert!(done.break_loop);
        assert_eq!(done.message, "the answer");
    }
}
