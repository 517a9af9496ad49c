//! Configuration type definitions for Overseer
//!
//! This module defines all configuration structs used by the orchestration
//! core. All types implement serde traits for JSON serialization and have
//! sensible defaults, so a missing or partial config file still yields a
//! runnable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration struct for Overseer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate limiting for model traffic (per agent).
    pub rate_limit: RateLimitConfig,
    /// Conversation history bounds and compaction split points.
    pub history: HistoryConfig,
    /// Automatic memory recall behavior.
    pub memory: MemoryConfig,
    /// Step response caching.
    pub caching: CachingConfig,
    /// Ordered workflow steps driving the message loop.
    pub workflow: WorkflowConfig,
    /// Per-error-kind handling policies.
    pub error_handling: ErrorHandlingConfig,
    /// Delegation tree bounds.
    pub delegation: DelegationConfig,
    /// Logging subscriber configuration.
    pub logging: LoggingConfig,
}

// ============================================================================
// Rate Limit Configuration
// ============================================================================

/// Sliding-window rate limit configuration.
///
/// A cap of `0` means unbounded for that dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    pub window_secs: u64,
    /// Maximum model calls inside the window.
    pub max_calls: u32,
    /// Maximum input tokens inside the window.
    pub max_input_tokens: u64,
    /// Maximum output tokens inside the window.
    pub max_output_tokens: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_calls: 15,
            max_input_tokens: 0,
            max_output_tokens: 0,
        }
    }
}

// ============================================================================
// History Configuration
// ============================================================================

/// History size bound and compaction split points.
///
/// When the history exceeds `keep_max` entries, the first `keep_start` and
/// last `keep_end` entries are preserved verbatim and the middle segment is
/// replaced by a single summarized human turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of history entries before compaction runs.
    pub keep_max: usize,
    /// Entries preserved at the start of the history.
    pub keep_start: usize,
    /// Entries preserved at the end of the history.
    pub keep_end: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            keep_max: 25,
            keep_start: 5,
            keep_end: 10,
        }
    }
}

// ============================================================================
// Memory Configuration
// ============================================================================

/// Automatic memory recall configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Number of memories requested per recall. `0` disables auto-recall.
    pub auto_recall: u32,
    /// Loop passes to skip between recalls (bounds recall cost).
    pub recall_skip: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            auto_recall: 3,
            recall_skip: 2,
        }
    }
}

// ============================================================================
// Caching Configuration
// ============================================================================

/// Step response caching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    /// Whether step responses are cached and reused.
    pub enabled: bool,
    /// How long a cached response stays valid, in seconds.
    pub duration_secs: u64,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_secs: 3600,
        }
    }
}

// ============================================================================
// Workflow Configuration
// ============================================================================

/// Ordered workflow steps consumed by the message loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// The step sequence. Each loop run walks these in order.
    pub steps: Vec<WorkflowStep>,
}

/// A single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step name, used in logs and as part of the cache key.
    pub name: String,
    /// Instruction sent to the model (or to the delegate) for this step.
    #[serde(default)]
    pub instruction: String,
    /// Role of the subordinate agent this step delegates to, if any.
    /// `None` means the step runs a local model call.
    #[serde(default)]
    pub delegate: Option<String>,
    /// Discard the role's existing subordinate and delegate to a fresh
    /// one instead of reusing its accumulated history.
    #[serde(default)]
    pub reset_delegate: bool,
}

impl WorkflowStep {
    /// Create a plain (non-delegated) step.
    pub fn new(name: &str, instruction: &str) -> Self {
        Self {
            name: name.to_string(),
            instruction: instruction.to_string(),
            delegate: None,
            reset_delegate: false,
        }
    }

    /// Create a step delegated to a subordinate role.
    pub fn delegated(name: &str, instruction: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            instruction: instruction.to_string(),
            delegate: Some(role.to_string()),
            reset_delegate: false,
        }
    }
}

// ============================================================================
// Error Handling Configuration
// ============================================================================

/// What to do when a step fails with a given error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Re-run the failed step up to `max_retries` additional attempts.
    Retry,
    /// Feed a formatted error report back into the conversation as a
    /// human turn and continue with the next step.
    HumanIntervention,
}

/// Policy for one error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Action taken when a step fails with this kind.
    pub action: ErrorAction,
    /// Additional attempts allowed when `action` is `Retry`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    1
}

/// Per-error-kind policy table.
///
/// Keys are [`crate::OverseerError::kind`] strings ("model", "tool", …).
/// Kinds without a policy fall back to `HumanIntervention`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    /// Policies keyed by error kind.
    pub policies: HashMap<String, ErrorPolicy>,
}

impl ErrorHandlingConfig {
    /// Look up the policy for an error kind.
    pub fn policy_for(&self, kind: &str) -> Option<&ErrorPolicy> {
        self.policies.get(kind)
    }
}

// ============================================================================
// Delegation Configuration
// ============================================================================

/// Delegation tree bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Maximum depth of the delegation tree. The root agent is depth 0;
    /// a spawn that would exceed this depth is refused with a recoverable
    /// error instead of recursing further.
    pub max_depth: u32,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable text.
    Compact,
    /// Structured JSON lines for log aggregators.
    Json,
}

/// Logging subscriber configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset (e.g. "info").
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_calls, 15);
        assert_eq!(config.history.keep_max, 25);
        assert_eq!(config.history.keep_start, 5);
        assert_eq!(config.history.keep_end, 10);
        assert_eq!(config.memory.auto_recall, 3);
        assert!(!config.caching.enabled);
        assert!(config.workflow.steps.is_empty());
        assert_eq!(config.delegation.max_depth, 8);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"rate_limit": {"max_calls": 3}}"#).unwrap();
        assert_eq!(config.rate_limit.max_calls, 3);
        // untouched fields keep their defaults
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.history.keep_max, 25);
    }

    #[test]
    fn test_workflow_step_constructors() {
        let plain = WorkflowStep::new("search", "Find relevant sources.");
        assert!(plain.delegate.is_none());

        let delegated = WorkflowStep::delegated("research", "Dig deeper.", "researcher");
        assert_eq!(delegated.delegate.as_deref(), Some("researcher"));
    }

    #[test]
    fn test_error_policy_deserialization() {
        let config: ErrorHandlingConfig = serde_json::from_str(
            r#"{"policies": {"model": {"action": "retry", "max_retries": 2},
                             "tool": {"action": "human_intervention"}}}"#,
        )
        .unwrap();

        let model = config.policy_for("model").unwrap();
        assert_eq!(model.action, ErrorAction::Retry);
        assert_eq!(model.max_retries, 2);

        let tool = config.policy_for("tool").unwrap();
        assert_eq!(tool.action, ErrorAction::HumanIntervention);
        assert_eq!(tool.max_retries, 1); // serde default

        assert!(config.policy_for("io").is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.workflow.steps.push(WorkflowStep::new("answer", "Answer the user."));
        config.caching.enabled = true;

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.workflow.steps.len(), 1);
        assert!(back.caching.enabled);
    }
}
