//! Deterministic scripted model backend.
//!
//! Serves a fixed queue of responses, streamed as fixed-size chunks with an
//! optional per-chunk delay. Used for offline runs and throughout the test
//! suite, where real provider traffic would make behavior nondeterministic.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{OverseerError, Result};
use crate::history::Message;

use super::{ChatModel, StreamEvent};

/// A [`ChatModel`] that replays scripted responses.
///
/// `stream_chat` pops the next queued response and streams it; once the
/// queue is exhausted, the last response is repeated. `complete_chat`
/// always returns the configured adhoc answer.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    adhoc_answer: Mutex<String>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    fail_adhoc: Mutex<bool>,
}

impl ScriptedModel {
    /// Create a model that replays `responses` in order.
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            last: Mutex::new(String::new()),
            adhoc_answer: Mutex::new("summary".to_string()),
            chunk_size: 8,
            chunk_delay: None,
            fail_adhoc: Mutex::new(false),
        }
    }

    /// Stream in chunks of `size` characters.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sleep `delay` between chunks, leaving room for interventions to
    /// land mid-stream in tests.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Set the canned `complete_chat` answer.
    pub fn with_adhoc_answer(self, answer: &str) -> Self {
        *self.adhoc_answer.lock().unwrap_or_else(|e| e.into_inner()) = answer.to_string();
        self
    }

    /// Make subsequent `complete_chat` calls fail.
    pub fn fail_adhoc_calls(&self, fail: bool) {
        *self.fail_adhoc.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    fn next_response(&self) -> String {
        let mut queue = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match queue.pop_front() {
            Some(response) => {
                *self.last.lock().unwrap_or_else(|e| e.into_inner()) = response.clone();
                response
            }
            None => self.last.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream_chat(
        &self,
        _system: &str,
        _history: &[Message],
        _instruction: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let response = self.next_response();
        let chunk_size = self.chunk_size;
        let chunk_delay = self.chunk_delay;

        let (tx, rx) = mpsc::channel::<StreamEvent>(32);
        tokio::spawn(async move {
            let chars: Vec<char> = response.chars().collect();
            for chunk in chars.chunks(chunk_size) {
                if let Some(delay) = chunk_delay {
                    tokio::time::sleep(delay).await;
                }
                let delta: String = chunk.iter().collect();
                if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                    return; // receiver dropped, stop streaming
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }

    async fn complete_chat(&self, _system: &str, _message: &str) -> Result<String> {
        if *self.fail_adhoc.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(OverseerError::Model("scripted adhoc failure".to_string()));
        }
        Ok(self
            .adhoc_answer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
