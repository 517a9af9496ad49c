//! The agent orchestrator.
//!
//! An [`Agent`] owns one conversation history, one rate limiter, a
//! pending-intervention slot, and a role-keyed map of subordinate agent
//! ids. Its [`Agent::message_loop`] walks the configured workflow steps:
//! for each step it composes a role-aware system prompt, either delegates
//! to a subordinate or streams a model response (with an intervention
//! checkpoint at every chunk), guards against verbatim repeats, and hands
//! the response to the tool dispatcher. A tool response flagged
//! `break_loop` short-circuits the remaining steps and becomes the loop's
//! terminal result.
//!
//! Step failures are routed through the configured error policies:
//! retry re-runs the step a bounded number of times, anything else is
//! formatted into the conversation as a human-authored error report so a
//! later model turn can self-correct. Intervention and cancellation
//! control signals bypass the policies entirely.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, ErrorAction, WorkflowStep};
use crate::error::{OverseerError, Result};
use crate::history::{History, Message, Role};
use crate::limiter::RateLimiter;
use crate::logger::{LogEvent, LogKind};
use crate::prompts;
use crate::providers::StreamEvent;
use crate::tools::dispatcher;
use crate::utils::string::preview;

use super::context::{AgentContext, AgentId};
use super::intervention;

/// Number of trailing history entries hashed into the step cache key.
const CACHE_HISTORY_WINDOW: usize = 5;

/// Rough character-per-token ratio used for limiter estimates.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug)]
struct CacheEntry {
    value: String,
    at: Instant,
}

/// One agent in a context's delegation tree.
#[derive(Debug)]
pub struct Agent {
    /// Identity inside the owning context's arena.
    pub id: AgentId,
    /// Sequence number within the context (0 = root).
    pub number: u64,
    /// Role name ("orchestrator" for the root, delegate role otherwise).
    pub role: String,
    /// Display name used in logs ("Agent 0").
    pub name: String,
    /// Superior agent, reachable for intervention broadcast. `None` for
    /// the root.
    pub superior: Option<AgentId>,
    /// Depth in the delegation tree (root = 0).
    pub depth: u32,
    /// Subordinates created by delegation, keyed by role.
    subordinates: Mutex<HashMap<String, AgentId>>,
    history: Mutex<History>,
    last_message: Mutex<String>,
    /// Pending intervention message. Empty = none. Written from the
    /// synchronous `communicate` path, hence a std mutex.
    intervention: StdMutex<String>,
    limiter: RateLimiter,
    /// Free-form store for cross-cutting references usable by tools.
    data: StdRwLock<HashMap<String, Value>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    memory_skip: AtomicU32,
}

impl Agent {
    /// Create an agent. Called by the context's arena, never directly.
    pub(crate) fn new(
        id: AgentId,
        number: u64,
        role: &str,
        superior: Option<AgentId>,
        depth: u32,
        config: &Config,
    ) -> Self {
        let mut data = HashMap::new();
        if let Some(superior_id) = superior {
            data.insert("superior".to_string(), json!(superior_id.value()));
        }

        Self {
            id,
            number,
            role: role.to_string(),
            name: format!("Agent {}", number),
            superior,
            depth,
            subordinates: Mutex::new(HashMap::new()),
            history: Mutex::new(History::new()),
            last_message: Mutex::new(String::new()),
            intervention: StdMutex::new(String::new()),
            limiter: RateLimiter::new(&config.rate_limit),
            data: StdRwLock::new(data),
            cache: Mutex::new(HashMap::new()),
            memory_skip: AtomicU32::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Data store and intervention slot
    // ------------------------------------------------------------------

    /// Read a value from the free-form data store.
    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Write a value into the free-form data store.
    pub fn set_data(&self, key: &str, value: Value) {
        self.data
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    /// Record a pending intervention message.
    pub fn set_intervention(&self, message: &str) {
        *self.intervention.lock().unwrap_or_else(|e| e.into_inner()) = message.to_string();
    }

    /// Take the pending intervention message, leaving the slot empty.
    pub(crate) fn take_intervention(&self) -> String {
        std::mem::take(&mut *self.intervention.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Snapshot of the conversation history.
    pub async fn history_snapshot(&self) -> Vec<Message> {
        self.history.lock().await.messages().to_vec()
    }

    /// The last AI message emitted by this agent.
    pub async fn last_message(&self) -> String {
        self.last_message.lock().await.clone()
    }

    // ------------------------------------------------------------------
    // Message loop
    // ------------------------------------------------------------------

    /// Run the full message loop over the configured workflow steps.
    ///
    /// Returns the terminal result of a `break_loop` tool response, or
    /// the fixed acknowledgement text when every step ran without one.
    ///
    /// # Errors
    /// Propagates cancellation and fatal errors; everything else is
    /// handled inside per the configured error policies.
    pub fn message_loop(
        self: Arc<Self>,
        context: Arc<AgentContext>,
        message: String,
    ) -> BoxFuture<'static, Result<String>> {
        Box::pin(async move {
            let result = self.run_loop(&context, &message).await;
            context.set_streaming(None);
            result
        })
    }

    async fn run_loop(&self, context: &Arc<AgentContext>, message: &str) -> Result<String> {
        self.append_message(context, &prompts::user_message(message), true)
            .await?;
        // Prime the recall skip counter; per-step composition fetches the
        // actual context.
        self.fetch_memories(context, true).await;

        let steps = context.config().workflow.steps.clone();
        for step in &steps {
            context.set_streaming(Some(self.id));

            let mut attempts: u32 = 0;
            loop {
                match self.run_step(context, step).await {
                    Ok(Some(terminal)) => {
                        info!(agent = %self.name, step = %step.name, "Loop finished with terminal result");
                        return Ok(terminal);
                    }
                    Ok(None) => break,
                    Err(e) if e.is_intervention() => break,
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) if e.is_fatal() => {
                        context
                            .log()
                            .log(LogEvent::new(LogKind::Error, &self.name, &e.to_string()));
                        return Err(e);
                    }
                    Err(e) => {
                        let policy = context.config().error_handling.policy_for(e.kind()).cloned();
                        match policy {
                            Some(p) if p.action == ErrorAction::Retry && attempts < p.max_retries => {
                                attempts += 1;
                                warn!(
                                    agent = %self.name,
                                    step = %step.name,
                                    attempt = attempts,
                                    error = %e,
                                    "Retrying step"
                                );
                                continue;
                            }
                            _ => {
                                let report = prompts::error_report(&e.to_string());
                                self.append_message(context, &report, true).await?;
                                context
                                    .log()
                                    .log(LogEvent::new(LogKind::Error, &self.name, &report));
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(prompts::message_received())
    }

    /// Run one workflow step. `Ok(Some(_))` is a terminal result.
    async fn run_step(
        &self,
        context: &Arc<AgentContext>,
        step: &WorkflowStep,
    ) -> Result<Option<String>> {
        let system = self.compose_system(context).await;

        // A step delegated to this agent's own role runs locally: the
        // workflow is shared by the whole tree, and the delegate of a step
        // must not re-delegate it to itself.
        let response = match &step.delegate {
            Some(role) if *role != self.role => {
                let delegated = self.delegate(context, step, role).await?;
                format!(
                    "Task '{}' delegated to {}. Response: {}",
                    step.name, role, delegated
                )
            }
            _ => self.stream_step(context, step, &system).await?,
        };

        intervention::check_and_consume(self, context, &response).await?;

        let repeated = { *self.last_message.lock().await == response };
        if repeated {
            self.append_message(context, &response, false).await?;
            let warning = prompts::message_repeated();
            self.append_message(context, &warning, true).await?;
            context
                .log()
                .log(LogEvent::new(LogKind::Warning, &self.name, &warning));
            return Ok(None);
        }

        self.append_message(context, &response, false).await?;
        dispatcher::dispatch(self, context, &response).await
    }

    /// Stream one model response, honoring cache and rate limits.
    async fn stream_step(
        &self,
        context: &Arc<AgentContext>,
        step: &WorkflowStep,
        system: &str,
    ) -> Result<String> {
        let cache_key = self.cache_key(&step.name).await;
        if let Some(hit) = self.cached(context, &cache_key).await {
            debug!(agent = %self.name, step = %step.name, "Step cache hit");
            return Ok(hit);
        }

        let history = self.history_snapshot().await;
        let prompt_chars = system.len()
            + step.instruction.len()
            + history.iter().map(|m| m.content.len()).sum::<usize>();
        self.limiter
            .reserve((prompt_chars / CHARS_PER_TOKEN) as u64)
            .await;

        context.log().log(LogEvent::new(
            LogKind::Agent,
            &self.name,
            &format!("Generating step {}", step.name),
        ));

        let mut rx = context
            .model()
            .stream_chat(system, &history, &step.instruction)
            .await?;

        let mut response = String::new();
        while let Some(event) = rx.recv().await {
            intervention::check_and_consume(self, context, &response).await?;
            match event {
                StreamEvent::Delta(delta) => {
                    response.push_str(&delta);
                    context.log().stream(&self.name, &delta);
                }
                StreamEvent::Done => break,
                StreamEvent::Error(e) => return Err(OverseerError::Model(e)),
            }
        }

        self.limiter
            .record_output((response.len() / CHARS_PER_TOKEN) as u64)
            .await;
        self.store_cache(context, cache_key, &response).await;

        Ok(response)
    }

    /// Compose the role-aware system prompt, with recalled memory context
    /// when the auto-memory pass is due.
    async fn compose_system(&self, context: &Arc<AgentContext>) -> String {
        let tool_names = context.tools().names().join(", ");
        let mut system = prompts::system_prompt(&self.name, &self.role, &tool_names);

        let memories = self.fetch_memories(context, false).await;
        if !memories.is_empty() {
            system.push_str("\n\n");
            system.push_str(&memories);
        }

        system
    }

    // ------------------------------------------------------------------
    // Delegation
    // ------------------------------------------------------------------

    /// Delegate a step to a subordinate agent keyed by role.
    ///
    /// The subordinate is created lazily and persists across calls, so
    /// repeated delegation to the same role reuses its accumulated
    /// history. Its full message loop runs to completion before this
    /// method returns (the tree is a call stack, not a fan-out).
    async fn delegate(
        &self,
        context: &Arc<AgentContext>,
        step: &WorkflowStep,
        role: &str,
    ) -> Result<String> {
        let existing = if step.reset_delegate {
            // A reset discards the role's previous subordinate entirely.
            if let Some(old) = self.subordinates.lock().await.remove(role) {
                context.remove_agent(old);
            }
            None
        } else {
            let subordinates = self.subordinates.lock().await;
            subordinates.get(role).copied().and_then(|id| context.agent(id))
        };

        let subordinate = match existing {
            Some(agent) => agent,
            None => {
                let agent = context.spawn_agent(role, Some(self.id))?;
                self.subordinates
                    .lock()
                    .await
                    .insert(role.to_string(), agent.id);
                info!(
                    agent = %self.name,
                    subordinate = %agent.name,
                    role = %role,
                    "Created subordinate agent"
                );
                agent
            }
        };

        context.log().log(LogEvent::new(
            LogKind::Agent,
            &self.name,
            &format!("Delegating step {} to {}", step.name, subordinate.name),
        ));

        // `message_loop` already returns a boxed future, which breaks the
        // recursive future cycle.
        let loop_future: BoxFuture<'static, Result<String>> =
            Arc::clone(&subordinate).message_loop(Arc::clone(context), step.instruction.clone());
        loop_future.await
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Append text to the history, merging same-role tails.
    ///
    /// When a new entry pushes the history over its configured bound,
    /// compaction runs before this method returns; a failed summarization
    /// propagates and leaves the history unmodified.
    pub async fn append_message(
        &self,
        context: &Arc<AgentContext>,
        text: &str,
        human: bool,
    ) -> Result<()> {
        let role = if human { Role::Human } else { Role::Ai };
        let created = self.history.lock().await.push(text, role);

        if !human {
            *self.last_message.lock().await = text.to_string();
        }

        if created {
            self.compact_history(context).await?;
        }
        Ok(())
    }

    /// Compact the history if it exceeds the configured bound.
    async fn compact_history(&self, context: &Arc<AgentContext>) -> Result<()> {
        let bounds = context.config().history.clone();

        let split = {
            let history = self.history.lock().await;
            if !history.over_limit(bounds.keep_max) {
                return Ok(());
            }
            history.split_for_summary(bounds.keep_start, bounds.keep_end)
        };

        let Some(split) = split else { return Ok(()) };
        if split.middle.is_empty() {
            return Ok(());
        }

        let fragment = History::concat(&split.middle);
        let summary = self
            .adhoc(
                context,
                &prompts::history_cleanup_system(),
                &fragment,
                "history compaction",
            )
            .await?;

        self.history.lock().await.apply_summary(split, &summary);
        Ok(())
    }

    /// Non-streaming utility model call, charged to the rate limiter.
    async fn adhoc(
        &self,
        context: &Arc<AgentContext>,
        system: &str,
        message: &str,
        label: &str,
    ) -> Result<String> {
        self.limiter
            .reserve(((system.len() + message.len()) / CHARS_PER_TOKEN) as u64)
            .await;

        let response = context.model().complete_chat(system, message).await?;
        self.limiter
            .record_output((response.len() / CHARS_PER_TOKEN) as u64)
            .await;

        context.log().log(LogEvent::new(
            LogKind::Adhoc,
            &self.name,
            &format!("{}: {}", label, preview(&response, 120)),
        ));
        Ok(response)
    }

    // ------------------------------------------------------------------
    // Auto-memory
    // ------------------------------------------------------------------

    /// Recall memory context for the system prompt.
    ///
    /// Skips `memory.recall_skip` loop passes between fetches to bound
    /// cost. Recall and distillation failures degrade to empty context.
    async fn fetch_memories(&self, context: &Arc<AgentContext>, reset_skip: bool) -> String {
        let memory_config = context.config().memory.clone();
        if memory_config.auto_recall == 0 {
            return String::new();
        }

        if reset_skip {
            self.memory_skip.store(0, Ordering::SeqCst);
        }
        let skip = self.memory_skip.load(Ordering::SeqCst);
        if skip > 0 {
            self.memory_skip.store(skip - 1, Ordering::SeqCst);
            return String::new();
        }
        self.memory_skip
            .store(memory_config.recall_skip, Ordering::SeqCst);

        let query = History::concat(&self.history_snapshot().await);
        let raw = match context
            .memory()
            .recall(&query, memory_config.auto_recall)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                context.log().log(LogEvent::new(
                    LogKind::Warning,
                    &self.name,
                    &format!("Memory recall failed: {}", e),
                ));
                return String::new();
            }
        };
        if raw.trim().is_empty() {
            return String::new();
        }

        let payload = json!({
            "conversation_history": query,
            "raw_memories": raw,
        })
        .to_string();

        match self
            .adhoc(
                context,
                &prompts::memory_cleanup_system(),
                &payload,
                "memory distillation",
            )
            .await
        {
            Ok(distilled) => distilled,
            Err(e) => {
                context.log().log(LogEvent::new(
                    LogKind::Warning,
                    &self.name,
                    &format!("Memory distillation failed: {}", e),
                ));
                String::new()
            }
        }
    }

    // ------------------------------------------------------------------
    // Step cache
    // ------------------------------------------------------------------

    async fn cache_key(&self, step_name: &str) -> String {
        let history = self.history.lock().await;
        let messages = history.messages();
        let window_start = messages.len().saturating_sub(CACHE_HISTORY_WINDOW);

        let mut hasher = DefaultHasher::new();
        for message in &messages[window_start..] {
            matches!(message.role, Role::Human).hash(&mut hasher);
            message.content.hash(&mut hasher);
        }
        format!("{}:{:016x}", step_name, hasher.finish())
    }

    async fn cached(&self, context: &Arc<AgentContext>, key: &str) -> Option<String> {
        let caching = &context.config().caching;
        if !caching.enabled {
            return None;
        }
        let cache = self.cache.lock().await;
        cache.get(key).and_then(|entry| {
            if entry.at.elapsed() < Duration::from_secs(caching.duration_secs) {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    async fn store_cache(&self, context: &Arc<AgentContext>, key: String, value: &str) {
        if !context.config().caching.enabled {
            return;
        }
        self.cache.lock().await.insert(
            key,
            CacheEntry {
                value: value.to_string(),
                at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::BufferSink;
    use crate::memory::{MemoryRecall, NoMemory};
    use crate::providers::ScriptedModel;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn context_with(config: Config) -> Arc<AgentContext> {
        AgentContext::new(
            config,
            Arc::new(ScriptedModel::new(vec!["ok"])),
            Arc::new(ToolRegistry::new()),
            Arc::new(NoMemory),
            Arc::new(BufferSink::new()),
            None,
        )
    }

    #[tokio::test]
    async fn test_data_store_roundtrip() {
        let context = context_with(Config::default());
        let agent = context.root();

        assert!(agent.get_data("missing").is_none());
        agent.set_data("note", json!("remember this"));
        assert_eq!(agent.get_data("note").unwrap(), json!("remember this"));
    }

    #[tokio::test]
    async fn test_subordinate_mirrors_superior_in_data_store() {
        let context = context_with(Config::default());
        let root = context.root();
        let sub = context.spawn_agent("helper", Some(root.id)).unwrap();
        assert_eq!(sub.get_data("superior").unwrap(), json!(root.id.value()));
    }

    #[tokio::test]
    async fn test_append_merges_and_tracks_last_message() {
        let context = context_with(Config::default());
        let agent = context.root();

        agent.append_message(&context, "first", false).await.unwrap();
        agent.append_message(&context, "second", false).await.unwrap();
        assert_eq!(agent.history_snapshot().await.len(), 1);
        assert_eq!(agent.last_message().await, "second");

        agent.append_message(&context, "a question", true).await.unwrap();
        assert_eq!(agent.history_snapshot().await.len(), 2);
        // human turns never update the last AI message
        assert_eq!(agent.last_message().await, "second");
    }

    #[tokio::test]
    async fn test_cache_key_tracks_history_window() {
        let context = context_with(Config::default());
        let agent = context.root();

        let before = agent.cache_key("step").await;
        agent.append_message(&context, "new turn", true).await.unwrap();
        let after = agent.cache_key("step").await;
        assert_ne!(before, after);
        assert_ne!(agent.cache_key("other").await, after);
    }

    #[tokio::test]
    async fn test_cache_disabled_stores_nothing() {
        let context = context_with(Config::default());
        let agent = context.root();

        agent.store_cache(&context, "k".to_string(), "v").await;
        assert!(agent.cached(&context, "k").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_enabled_roundtrip_and_expiry() {
        tokio::time::pause();
        let mut config = Config::default();
        config.caching.enabled = true;
        config.caching.duration_secs = 10;
        let context = context_with(config);
        let agent = context.root();

        agent.store_cache(&context, "k".to_string(), "v").await;
        assert_eq!(agent.cached(&context, "k").await.as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(agent.cached(&context, "k").await.is_none());
    }

    struct CountingMemory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MemoryRecall for CountingMemory {
        async fn recall(&self, _query: &str, _count: u32) -> crate::error::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("a relevant memory".to_string())
        }
    }

    #[tokio::test]
    async fn test_memory_skip_counter_bounds_recalls() {
        let memory = Arc::new(CountingMemory {
            calls: AtomicUsize::new(0),
        });
        let mut config = Config::default();
        config.memory.auto_recall = 3;
        config.memory.recall_skip = 2;

        let context = AgentContext::new(
            config,
            Arc::new(ScriptedModel::new(vec![]).with_adhoc_answer("distilled")),
            Arc::new(ToolRegistry::new()),
            Arc::clone(&memory) as Arc<dyn MemoryRecall>,
            Arc::new(BufferSink::new()),
            None,
        );
        let agent = context.root();

        // first fetch recalls, the next two are skipped, the fourth recalls
        assert_eq!(agent.fetch_memories(&context, false).await, "distilled");
        assert_eq!(agent.fetch_memories(&context, false).await, "");
        assert_eq!(agent.fetch_memories(&context, false).await, "");
        assert_eq!(agent.fetch_memories(&context, false).await, "distilled");
        assert_eq!(memory.calls.load(Ordering::SeqCst), 2);

        // reset forces an immediate recall
        assert_eq!(agent.fetch_memories(&context, true).await, "distilled");
        assert_eq!(memory.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_memory_disabled_never_recalls() {
        let mut config = Config::default();
        config.memory.auto_recall = 0;
        let context = context_with(config);
        let agent = context.root();
        assert_eq!(agent.fetch_memories(&context, true).await, "");
    }
}
