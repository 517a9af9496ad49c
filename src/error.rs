//! Error types for Overseer
//!
//! This module defines all error types used throughout the orchestration
//! core. Uses `thiserror` for ergonomic error handling with automatic
//! `Display` and `Error` trait implementations.
//!
//! Two variants are control signals rather than true failures:
//!
//! - [`OverseerError::Intervention`] — a human message pre-empted the
//!   current step; state is already saved and the loop proceeds to the
//!   next step.
//! - [`OverseerError::Cancelled`] — the owning task was killed; the loop
//!   unwinds entirely.
//!
//! Everything else is classified by [`OverseerError::kind`] so the
//! workflow's error-handling policies can decide between retrying a step
//! and reporting the error back into the conversation.

use thiserror::Error;

/// The primary error type for Overseer operations.
#[derive(Error, Debug)]
pub enum OverseerError {
    /// Control signal: an intervention message pre-empted the current step.
    /// Never surfaced to the user as an error.
    #[error("intervention")]
    Intervention,

    /// Control signal: the owning task was killed from outside.
    #[error("cancelled")]
    Cancelled,

    /// Unrecoverable error that terminates the whole message loop.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Model backend failure (stream error, adhoc completion failure).
    #[error("Model error: {0}")]
    Model(String),

    /// Tool lifecycle failure.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Memory collaborator failure.
    #[error("Memory error: {0}")]
    Memory(String),

    /// Configuration-related errors (invalid config, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task lifecycle errors (double result claim, join failures).
    #[error("Task error: {0}")]
    Task(String),

    /// Context registry errors (duplicate id, unknown id).
    #[error("Registry error: {0}")]
    Registry(String),

    /// IO errors from std
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OverseerError {
    /// Policy key for this error, matched against the workflow's
    /// `error_handling` table.
    ///
    /// Control signals (`Intervention`, `Cancelled`) and `Fatal` are never
    /// routed through policies; their kinds exist for logging only.
    pub fn kind(&self) -> &'static str {
        match self {
            OverseerError::Intervention => "intervention",
            OverseerError::Cancelled => "cancelled",
            OverseerError::Fatal(_) => "fatal",
            OverseerError::Model(_) => "model",
            OverseerError::Tool(_) => "tool",
            OverseerError::Memory(_) => "memory",
            OverseerError::Config(_) => "config",
            OverseerError::Task(_) => "task",
            OverseerError::Registry(_) => "registry",
            OverseerError::Io(_) => "io",
            OverseerError::Json(_) => "json",
        }
    }

    /// Returns `true` for the step-level control signal.
    pub fn is_intervention(&self) -> bool {
        matches!(self, OverseerError::Intervention)
    }

    /// Returns `true` when the owning task was killed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OverseerError::Cancelled)
    }

    /// Returns `true` for the designated unrecoverable kind.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OverseerError::Fatal(_))
    }
}

/// Convenience result type using [`OverseerError`].
pub type Result<T> = std::result::Result<T, OverseerError>;
