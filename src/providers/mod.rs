//! Model backend contract.
//!
//! The orchestration core treats the language model as an opaque streaming
//! chat-completion capability behind the [`ChatModel`] trait. Streaming is
//! delivered as a bounded channel of [`StreamEvent`]s so the consumer can
//! interleave intervention checks at every chunk boundary; the stream is
//! finite and not restartable. [`ChatModel::complete_chat`] is the
//! non-streaming variant used for adhoc utility calls (history
//! summarization, memory distillation).

pub mod scripted;

pub use scripted::ScriptedModel;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::history::Message;

/// One event on a model response stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of response text.
    Delta(String),
    /// The stream finished normally.
    Done,
    /// The stream failed; no further events follow.
    Error(String),
}

/// Opaque streaming chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Open a streaming chat completion.
    ///
    /// # Arguments
    /// * `system` - The system prompt
    /// * `history` - Prior conversation turns
    /// * `instruction` - The current step's instruction, sent as the final
    ///   human turn
    ///
    /// # Returns
    /// A receiver yielding [`StreamEvent`]s. The sequence is a finite run
    /// of `Delta`s terminated by `Done` or `Error`.
    async fn stream_chat(
        &self,
        system: &str,
        history: &[Message],
        instruction: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>>;

    /// Non-streaming completion for adhoc utility calls.
    async fn complete_chat(&self, system: &str, message: &str) -> Result<String>;
}
