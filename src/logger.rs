//! Structured log sink abstraction.
//!
//! The core reports progress through an append-only [`LogSink`]: discrete
//! [`LogEvent`]s for step lifecycle, warnings, and errors, plus a
//! `stream` channel for incremental model output. The default
//! [`TracingSink`] forwards everything into `tracing`; [`BufferSink`]
//! records events in memory for tests and UIs that replay a session.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Category tag for a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// A step's model generation started or produced a result.
    Agent,
    /// An auxiliary non-streaming model call (summarization, memory).
    Adhoc,
    /// Tool lifecycle activity.
    Tool,
    /// Recoverable conditions (repeats, misformats, recall failures).
    Warning,
    /// Errors reported to the user.
    Error,
    /// Everything else.
    Info,
}

/// One structured log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Category tag.
    pub kind: LogKind,
    /// Short heading (agent name, step name).
    pub heading: String,
    /// Event body.
    pub content: String,
    /// Optional structured key/values.
    pub kvps: Option<Map<String, Value>>,
    /// When the event was produced.
    pub at: DateTime<Utc>,
}

impl LogEvent {
    /// Create an event with the current timestamp and no key/values.
    pub fn new(kind: LogKind, heading: &str, content: &str) -> Self {
        Self {
            kind,
            heading: heading.to_string(),
            content: content.to_string(),
            kvps: None,
            at: Utc::now(),
        }
    }

    /// Attach structured key/values.
    pub fn with_kvps(mut self, kvps: Map<String, Value>) -> Self {
        self.kvps = Some(kvps);
        self
    }
}

/// Append-only structured event receiver.
///
/// Implementations must be cheap to call from the hot streaming path; the
/// core never interprets sink behavior beyond "accepts content".
pub trait LogSink: Send + Sync {
    /// Record one event.
    fn log(&self, event: LogEvent);

    /// Receive an incremental chunk of streamed model output.
    ///
    /// Default implementation drops deltas; sinks that render live output
    /// override this.
    fn stream(&self, _heading: &str, _delta: &str) {}
}

/// Default sink: forwards events into `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: LogEvent) {
        let kvps = event
            .kvps
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default())
            .unwrap_or_default();
        match event.kind {
            LogKind::Error => {
                tracing::error!(heading = %event.heading, kvps = %kvps, "{}", event.content)
            }
            LogKind::Warning => {
                tracing::warn!(heading = %event.heading, kvps = %kvps, "{}", event.content)
            }
            _ => tracing::info!(heading = %event.heading, kvps = %kvps, "{}", event.content),
        }
    }

    fn stream(&self, heading: &str, delta: &str) {
        tracing::trace!(heading = %heading, "{}", delta);
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    events: Mutex<Vec<LogEvent>>,
    streamed: Mutex<String>,
}

impl BufferSink {
    /// Create an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All streamed deltas concatenated.
    pub fn streamed(&self) -> String {
        self.streamed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events of one kind.
    pub fn events_of(&self, kind: LogKind) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl LogSink for BufferSink {
    fn log(&self, event: LogEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    fn stream(&self, _heading: &str, delta: &str) {
        self.streamed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_records_events() {
        let sink = BufferSink::new();
        sink.log(LogEvent::new(LogKind::Agent, "Agent 0", "step start"));
        sink.log(LogEvent::new(LogKind::Warning, "Agent 0", "repeat"));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events_of(LogKind::Warning).len(), 1);
        assert_eq!(sink.events_of(LogKind::Error).len(), 0);
    }

    #[test]
    fn test_buffer_sink_accumulates_stream() {
        let sink = BufferSink::new();
        sink.stream("Agent 0", "hel");
        sink.stream("Agent 0", "lo");
        assert_eq!(sink.streamed(), "hello");
    }

    #[test]
    fn test_event_kvps() {
        let mut kvps = Map::new();
        kvps.insert("step".to_string(), Value::String("search".to_string()));
        let event = LogEvent::new(LogKind::Agent, "Agent 0", "generating").with_kvps(kvps);
        assert!(event.kvps.unwrap().contains_key("step"));
    }
}
