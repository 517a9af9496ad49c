//! Fixed framework message templates.
//!
//! These are the conversation-visible texts the core injects on its own
//! behalf: wrapping user input, reporting interventions, flagging
//! misformatted or repeated model output, and the system prompts for the
//! adhoc summarization and memory-distillation calls. Template rendering
//! for role/system prompts beyond these fixed texts is an external
//! concern.

/// Role-aware system prompt for one agent.
pub fn system_prompt(name: &str, role: &str, tool_names: &str) -> String {
    format!(
        "You are {}, an autonomous agent acting in the \"{}\" role. \
         Work through the task you are given step by step. To act, reply \
         with a single JSON object of the form \
         {{\"tool_name\": ..., \"tool_args\": {{...}}}}. \
         Available tools: {}. End the task with the \"respond\" tool and \
         your final answer.",
        name, role, tool_names
    )
}

/// Wrap an incoming user message before the initial human append.
pub fn user_message(message: &str) -> String {
    format!("User message:\n{}", message)
}

/// Wrap an intervention message appended as a human turn mid-step.
pub fn intervention(message: &str) -> String {
    format!(
        "The user has interrupted you with the following message. \
         Adjust your work accordingly before continuing.\n\n{}",
        message
    )
}

/// Notice appended when model output contained no parseable tool call.
pub fn misformat() -> String {
    "Your last message was misformatted. Reply with a single JSON object \
     containing \"tool_name\" and \"tool_args\"."
        .to_string()
}

/// Warning appended when the model repeats its previous message verbatim.
pub fn message_repeated() -> String {
    "You have sent the same message again. Do not repeat yourself; \
     take a different action or end with your final answer."
        .to_string()
}

/// Error report fed back into the conversation as a human turn.
pub fn error_report(error: &str) -> String {
    format!(
        "An error occurred while processing your last message:\n{}\n\
         Correct the problem and continue.",
        error
    )
}

/// Response returned by the `unknown` sentinel tool.
pub fn unknown_tool(name: &str) -> String {
    format!(
        "The tool \"{}\" does not exist. Use one of the tools listed in \
         your system prompt.",
        name
    )
}

/// Final value of a loop that exhausted its steps without a terminal
/// tool response.
pub fn message_received() -> String {
    "Message received.".to_string()
}

/// System prompt for the adhoc call that summarizes the compacted middle
/// segment of the history.
pub fn history_cleanup_system() -> String {
    "Summarize the following conversation fragment. Preserve every fact, \
     decision, and open task; drop pleasantries and repetition. Respond \
     with the summary only."
        .to_string()
}

/// System prompt for the adhoc call that distills raw memory recall
/// against the current conversation.
pub fn memory_cleanup_system() -> String {
    "You are given a conversation history and raw memory search results. \
     Extract only the memories relevant to the conversation and restate \
     them concisely. Respond with the relevant memories only, or with an \
     empty string if none apply."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_payload() {
        assert!(user_message("hello").contains("hello"));
        assert!(intervention("stop").contains("stop"));
        assert!(error_report("boom").contains("boom"));
        assert!(unknown_tool("frobnicate").contains("frobnicate"));
    }

    #[test]
    fn test_fixed_notices_are_stable() {
        assert_eq!(misformat(), misformat());
        assert_eq!(message_repeated(), message_repeated());
        assert_eq!(message_received(), "Message received.");
    }
}
