//! Tool lifecycle dispatcher.
//!
//! Takes a model response, attempts lenient extraction of a tool
//! invocation, and drives the resolved tool through its
//! before/execute/after lifecycle with an intervention checkpoint between
//! every stage. Parse failures never raise: they reduce to a misformat
//! notice appended to the conversation, and the loop continues.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::agent::{Agent, AgentContext};
use crate::agent::intervention;
use crate::error::Result;
use crate::logger::{LogEvent, LogKind};
use crate::prompts;
use crate::utils::string::preview;

use super::parse;

/// Dispatch a model response.
///
/// # Returns
/// `Ok(Some(message))` when the tool response has `break_loop` set —
/// the enclosing loop returns `message` as its terminal result.
/// `Ok(None)` otherwise (including parse failures), letting the loop
/// continue with the next step.
///
/// # Errors
/// Propagates intervention control signals from the checkpoints and
/// tool lifecycle failures (routed through the step error policies).
pub async fn dispatch(
    agent: &Agent,
    context: &Arc<AgentContext>,
    raw: &str,
) -> Result<Option<String>> {
    let Some(mut invocation) = parse::extract_invocation(raw) else {
        let notice = prompts::misformat();
        agent.append_message(context, &notice, true).await?;
        context.log().log(LogEvent::new(
            LogKind::Warning,
            &agent.name,
            &format!("Message misformat: {}", preview(raw, 80)),
        ));
        return Ok(None);
    };

    let tool = context.tools().resolve(&invocation.tool_name);
    if !context.tools().has(&invocation.tool_name) {
        // Let the sentinel name the tool it is standing in for.
        if let Some(args) = invocation.tool_args.as_object_mut() {
            args.insert("_requested_name".to_string(), json!(invocation.tool_name));
        }
    }

    info!(agent = %agent.name, tool = %tool.name(), "Dispatching tool");
    context.log().log(LogEvent::new(
        LogKind::Tool,
        &agent.name,
        &format!("Using tool {}", tool.name()),
    ));

    intervention::check_and_consume(agent, context, "").await?;
    tool.before_execution(&invocation.tool_args).await?;

    intervention::check_and_consume(agent, context, "").await?;
    let response = tool.execute(invocation.tool_args.clone()).await?;

    intervention::check_and_consume(agent, context, "").await?;
    tool.after_execution(&response).await?;

    intervention::check_and_consume(agent, context, "").await?;

    if response.break_loop {
        return Ok(Some(response.message));
    }

    // Non-terminal tool output feeds back into the conversation.
    if !response.message.is_empty() {
        agent.append_message(context, &response.message, true).await?;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::history::Role;
    use crate::logger::BufferSink;
    use crate::memory::NoMemory;
    use crate::providers::ScriptedModel;
    use crate::tools::{RespondTool, ToolRegistry};

    fn test_context(sink: Arc<BufferSink>) -> Arc<AgentContext> {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RespondTool)).unwrap();
        AgentContext::new(
            Config::default(),
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(tools),
            Arc::new(NoMemory),
            sink,
            None,
        )
    }

    #[tokio::test]
    async fn test_parse_failure_appends_misformat_notice() {
        let sink = Arc::new(BufferSink::new());
        let context = test_context(Arc::clone(&sink));
        let agent = context.root();

        let result = dispatch(&agent, &context, "no tool call here").await.unwrap();
        assert!(result.is_none());

        let history = agent.history_snapshot().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Human);
        assert_eq!(history[0].content, prompts::misformat());
        assert_eq!(sink.events_of(LogKind::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_break_loop_returns_terminal_message() {
        let sink = Arc::new(BufferSink::new());
        let context = test_context(sink);
        let agent = context.root();

        let raw = r#"{"tool_name": "respond", "tool_args": {"text": "42"}}"#;
        let result = dispatch(&agent, &context, raw).await.unwrap();
        assert_eq!(result.as_deref(), Some("42"));
        // terminal responses are not appended back into the history
        assert!(agent.history_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_notice_back() {
        let sink = Arc::new(BufferSink::new());
        let context = test_context(sink);
        let agent = context.root();

        let raw = r#"{"tool_name": "teleport", "tool_args": {}}"#;
        let result = dispatch(&agent, &context, raw).await.unwrap();
        assert!(result.is_none());

        let history = agent.history_snapshot().await;
        assert_eq!(history.len(), 1);
        assert!(history[0].content.contains("teleport"));
    }

    #[tokio::test]
    async fn test_intervention_between_stages_unwinds() {
        let sink = Arc::new(BufferSink::new());
        let context = test_context(sink);
        let agent = context.root();
        agent.set_intervention("stop that");

        let raw = r#"{"tool_name": "respond", "tool_args": {"text": "42"}}"#;
        let err = dispatch(&agent, &context, raw).await.unwrap_err();
        assert!(err.is_intervention());

        let history = agent.history_snapshot().await;
        assert_eq!(history.len(), 1);
        assert!(history[0].content.contains("stop that"));
    }
}
