//! Overseer - hierarchical agent orchestration core.
//!
//! Overseer turns a stream of conversation turns into model calls. The
//! root agent of a session walks a configured sequence of workflow
//! steps; each step streams a model response (interruptible at every
//! chunk), dispatches a tool parsed from the response text, or delegates
//! to a subordinate agent that runs the same loop recursively. Sessions
//! are cancellable, resumable, pausable, and rate limited, and their
//! histories are compacted under a size bound via model-generated
//! summaries.
//!
//! The HTTP/API layer, persistence, concrete tool implementations, and
//! the language model backend itself are external collaborators behind
//! the [`providers::ChatModel`], [`tools::Tool`], [`memory::MemoryRecall`]
//! and [`logger::LogSink`] traits.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use overseer::agent::{AgentContext, ContextRegistry};
//! use overseer::config::{Config, WorkflowStep};
//! use overseer::logger::TracingSink;
//! use overseer::memory::NoMemory;
//! use overseer::providers::ScriptedModel;
//! use overseer::tools::{RespondTool, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = Config::default();
//!     config.workflow.steps.push(WorkflowStep::new("answer", "Answer the user."));
//!
//!     let mut tools = ToolRegistry::new();
//!     tools.register(Arc::new(RespondTool)).unwrap();
//!
//!     let context = AgentContext::new(
//!         config,
//!         Arc::new(ScriptedModel::new(vec![
//!             r#"{"tool_name": "respond", "tool_args": {"text": "4"}}"#,
//!         ])),
//!         Arc::new(tools),
//!         Arc::new(NoMemory),
//!         Arc::new(TracingSink),
//!         None,
//!     );
//!     ContextRegistry::global().insert(Arc::clone(&context)).unwrap();
//!
//!     let task = context.communicate("What is 2+2?", 1);
//!     assert_eq!(task.result().await.unwrap(), "4");
//!
//!     ContextRegistry::global().remove(&context.id);
//! }
//! ```

pub mod agent;
pub mod config;
pub mod defer;
pub mod error;
pub mod history;
pub mod limiter;
pub mod logger;
pub mod memory;
pub mod prompts;
pub mod providers;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentContext, AgentId, ContextRegistry};
pub use config::Config;
pub use defer::{DeferredTask, TaskState};
pub use error::{OverseerError, Result};
pub use history::{History, Message, Role};
pub use limiter::RateLimiter;
pub use logger::{BufferSink, LogEvent, LogKind, LogSink, TracingSink};
pub use memory::{MemoryRecall, NoMemory};
pub use providers::{ChatModel, ScriptedModel, StreamEvent};
pub use tools::{Tool, ToolRegistry, ToolResponse};
