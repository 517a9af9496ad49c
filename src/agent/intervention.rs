//! Cooperative intervention handling.
//!
//! [`check_and_consume`] is the suspension point the message loop hits at
//! every meaningful boundary: each streamed chunk, after streaming, and
//! between tool lifecycle stages. While the context's shared pause flag
//! is set, the caller sleeps in short intervals instead of spinning. A
//! pending intervention message is consumed exactly once: the partial
//! model output produced so far is appended as an AI turn, then the
//! wrapped intervention as a human turn (always in that order), and the
//! `Intervention` control signal unwinds only the current step.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{OverseerError, Result};
use crate::prompts;

use super::agent::Agent;
use super::context::AgentContext;

/// Poll interval while the context is paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Suspend while paused, then consume a pending intervention if present.
///
/// # Returns
/// `Ok(())` when no intervention is pending, or `Err(Intervention)` after
/// recording the pending message, signalling the loop to abandon the
/// current step and move on.
pub(crate) async fn check_and_consume(
    agent: &Agent,
    context: &Arc<AgentContext>,
    partial: &str,
) -> Result<()> {
    while context.is_paused() {
        tokio::time::sleep(PAUSE_POLL).await;
    }

    let pending = agent.take_intervention();
    if pending.is_empty() {
        return Ok(());
    }

    // Partial AI output lands before the human intervention turn.
    if !partial.trim().is_empty() {
        agent.append_message(context, partial, false).await?;
    }
    agent
        .append_message(context, &prompts::intervention(&pending), true)
        .await?;

    Err(OverseerError::Intervention)
}
