//! Agent module - the orchestration tree.
//!
//! This module holds the per-session [`AgentContext`] (delegation tree,
//! shared pause flag, running task), the [`Agent`] orchestrator with its
//! workflow message loop, the cooperative intervention checkpoint, and
//! the process-wide [`ContextRegistry`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   communicate()   ┌───────────────────────────┐
//! │ ContextRegistry  │──────────────────>│ AgentContext              │
//! │ (process-wide)   │                   │  paused · task · arena    │
//! └──────────────────┘                   └─────────────┬─────────────┘
//!                                                      │ owns (by id)
//!                                        ┌─────────────▼─────────────┐
//!                                        │ Agent 0 (orchestrator)    │
//!                                        │  history · limiter · data │
//!                                        └─────────────┬─────────────┘
//!                                            delegate  │  per role
//!                                        ┌─────────────▼─────────────┐
//!                                        │ Agent 1..n (subordinates) │
//!                                        └───────────────────────────┘
//! ```

#[allow(clippy::module_inception)]
mod agent;
mod context;
pub(crate) mod intervention;

pub use agent::Agent;
pub use context::{AgentContext, AgentId, ContextRegistry};
