//! Session context and the process-wide context registry.
//!
//! An [`AgentContext`] binds one delegation tree of agents, one live
//! [`DeferredTask`] running the root agent's message loop, the shared
//! pause flag, and the collaborators (model backend, tool registry,
//! memory, log sink) every agent in the tree uses.
//!
//! Agents are owned arena-style: the context holds the only strong
//! references in an id-keyed map, and superior/subordinate links are
//! stored as [`AgentId`] lookups. This keeps the recursive
//! agent ↔ subordinate ↔ superior topology free of reference cycles.
//!
//! The [`ContextRegistry`] is the explicit process-wide service owning
//! all live contexts: created at process start (or per test), entries
//! removed on explicit [`ContextRegistry::remove`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::defer::DeferredTask;
use crate::error::{OverseerError, Result};
use crate::logger::LogSink;
use crate::memory::MemoryRecall;
use crate::providers::ChatModel;
use crate::tools::ToolRegistry;

use super::agent::Agent;

/// Identity of one agent inside its context's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u64);

impl AgentId {
    /// Raw numeric value (stable within one context).
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Rebuild an id from its raw value (arena lookups in embedders and
    /// tests).
    pub fn from_value(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global creation counter giving contexts a stable ordering for
/// [`ContextRegistry::first`].
static CONTEXT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One session: a delegation tree of agents plus its running task.
pub struct AgentContext {
    /// Opaque session id.
    pub id: String,
    /// Creation sequence number (process-wide).
    pub no: u64,
    config: Config,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryRecall>,
    log: Arc<dyn LogSink>,
    /// Pause flag shared by every agent in the tree.
    paused: AtomicBool,
    /// Arena owning every agent in the tree, keyed by identity.
    agents: RwLock<HashMap<AgentId, Arc<Agent>>>,
    root_id: RwLock<AgentId>,
    /// The agent currently streaming, if any.
    streaming: RwLock<Option<AgentId>>,
    agent_seq: AtomicU64,
    /// At most one live message-loop task.
    task: Mutex<Option<Arc<DeferredTask>>>,
}

impl AgentContext {
    /// Role name given to root agents.
    pub const ROOT_ROLE: &'static str = "orchestrator";

    /// Create a context with a fresh root agent.
    ///
    /// # Arguments
    /// * `config` - Configuration snapshot owned by this context
    /// * `model` - Streaming chat backend shared by the tree
    /// * `tools` - Tool registry shared by the tree
    /// * `memory` - Memory recall collaborator
    /// * `log` - Structured log sink
    /// * `id` - Explicit session id, or `None` for a random UUID
    pub fn new(
        config: Config,
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryRecall>,
        log: Arc<dyn LogSink>,
        id: Option<&str>,
    ) -> Arc<Self> {
        let context = Arc::new(Self {
            id: id.map(|s| s.to_string()).unwrap_or_else(|| Uuid::new_v4().to_string()),
            no: CONTEXT_COUNTER.fetch_add(1, Ordering::SeqCst) + 1,
            config,
            model,
            tools,
            memory,
            log,
            paused: AtomicBool::new(false),
            agents: RwLock::new(HashMap::new()),
            root_id: RwLock::new(AgentId(0)),
            streaming: RwLock::new(None),
            agent_seq: AtomicU64::new(0),
            task: Mutex::new(None),
        });

        let root = context
            .spawn_agent(Self::ROOT_ROLE, None)
            .expect("root agent spawn cannot exceed delegation depth");
        *write(&context.root_id) = root.id;

        info!(context_id = %context.id, "Created agent context");
        context
    }

    /// Create a new agent inside this context's arena.
    ///
    /// Fails with a recoverable `Tool` error when the subordinate would
    /// exceed the configured delegation depth.
    pub fn spawn_agent(&self, role: &str, superior: Option<AgentId>) -> Result<Arc<Agent>> {
        let depth = match superior {
            Some(superior_id) => {
                let parent = self.agent(superior_id).ok_or_else(|| {
                    OverseerError::Registry(format!("unknown superior agent {}", superior_id))
                })?;
                parent.depth + 1
            }
            None => 0,
        };

        if depth > self.config.delegation.max_depth {
            return Err(OverseerError::Tool(format!(
                "delegation refused: depth {} exceeds the configured maximum of {}",
                depth, self.config.delegation.max_depth
            )));
        }

        let number = self.agent_seq.fetch_add(1, Ordering::SeqCst);
        let id = AgentId(number);
        let agent = Arc::new(Agent::new(id, number, role, superior, depth, &self.config));
        write(&self.agents).insert(id, Arc::clone(&agent));
        Ok(agent)
    }

    /// Look up an agent by identity.
    pub fn agent(&self, id: AgentId) -> Option<Arc<Agent>> {
        read(&self.agents).get(&id).cloned()
    }

    /// Drop an agent from the arena (subordinate replaced by a reset).
    pub(crate) fn remove_agent(&self, id: AgentId) {
        write(&self.agents).remove(&id);
    }

    /// The root agent of the tree.
    pub fn root(&self) -> Arc<Agent> {
        let root_id = *read(&self.root_id);
        self.agent(root_id).expect("root agent always present")
    }

    /// Mark (or clear) the currently streaming agent.
    pub fn set_streaming(&self, id: Option<AgentId>) {
        *write(&self.streaming) = id;
    }

    /// The currently streaming agent's identity, if any.
    pub fn streaming(&self) -> Option<AgentId> {
        *read(&self.streaming)
    }

    /// Set or clear the shared pause flag.
    pub fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Whether the tree is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Configuration snapshot.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Model backend.
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Tool registry.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Memory collaborator.
    pub fn memory(&self) -> &Arc<dyn MemoryRecall> {
        &self.memory
    }

    /// Log sink.
    pub fn log(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    /// The live task, if one is stored.
    pub fn task(&self) -> Option<Arc<DeferredTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deliver a message to this context.
    ///
    /// Clears the pause flag. If a message loop is currently running, the
    /// text is delivered as an intervention to the active agent (the one
    /// currently streaming, else the root) and propagated up the superior
    /// chain while `broadcast_level != 0`, decrementing per hop.
    /// `broadcast_level` of 1 therefore reaches only the active agent, 2
    /// adds one ancestor, and a negative value reaches the whole chain.
    /// Otherwise a new task is started running the root agent's message
    /// loop with `text` as input.
    ///
    /// Returns the (existing or new) task.
    pub fn communicate(self: &Arc<Self>, text: &str, broadcast_level: i32) -> Arc<DeferredTask> {
        self.pause(false);

        let existing = self.task();
        if let Some(task) = existing.filter(|t| t.is_alive()) {
            let start = self.streaming().unwrap_or(*read(&self.root_id));
            let mut cursor = Some(start);
            let mut level = broadcast_level;

            while let Some(id) = cursor {
                if level == 0 {
                    break;
                }
                match self.agent(id) {
                    Some(agent) => {
                        agent.set_intervention(text);
                        cursor = agent.superior;
                    }
                    None => break,
                }
                level -= 1;
            }

            return task;
        }

        let root = self.root();
        let context = Arc::clone(self);
        let message = text.to_string();
        let task = Arc::new(DeferredTask::spawn(async move {
            root.message_loop(context, message).await
        }));
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&task));
        task
    }

    /// Discard the running task and all agents, creating a fresh root.
    pub fn reset(&self) {
        if let Some(task) = self.task() {
            task.kill();
        }
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = None;

        write(&self.agents).clear();
        self.agent_seq.store(0, Ordering::SeqCst);
        self.set_streaming(None);
        self.pause(false);

        let root = self
            .spawn_agent(Self::ROOT_ROLE, None)
            .expect("root agent spawn cannot exceed delegation depth");
        *write(&self.root_id) = root.id;

        info!(context_id = %self.id, "Context reset");
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Process-wide registry of live contexts.
///
/// Cross-context mutation (create/remove) is mutually exclusive under one
/// lock. Use [`ContextRegistry::global`] for the shared instance or
/// construct isolated registries in tests.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<String, Arc<AgentContext>>>,
}

static GLOBAL_REGISTRY: Lazy<ContextRegistry> = Lazy::new(ContextRegistry::new);

impl ContextRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static ContextRegistry {
        &GLOBAL_REGISTRY
    }

    /// Construct a context and register it in one step.
    ///
    /// See [`AgentContext::new`] for the collaborator arguments. Fails
    /// when `id` names an already-registered context.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        config: Config,
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryRecall>,
        log: Arc<dyn LogSink>,
        id: Option<&str>,
    ) -> Result<Arc<AgentContext>> {
        let context = AgentContext::new(config, model, tools, memory, log, id);
        self.insert(Arc::clone(&context))?;
        Ok(context)
    }

    /// Insert a context. Exactly one context per id.
    pub fn insert(&self, context: Arc<AgentContext>) -> Result<()> {
        let mut contexts = write(&self.contexts);
        if contexts.contains_key(&context.id) {
            return Err(OverseerError::Registry(format!(
                "context \"{}\" already exists",
                context.id
            )));
        }
        contexts.insert(context.id.clone(), context);
        Ok(())
    }

    /// Look up a context by id.
    pub fn get(&self, id: &str) -> Option<Arc<AgentContext>> {
        read(&self.contexts).get(id).cloned()
    }

    /// The earliest-created live context, if any.
    pub fn first(&self) -> Option<Arc<AgentContext>> {
        read(&self.contexts)
            .values()
            .min_by_key(|c| c.no)
            .cloned()
    }

    /// Remove a context, killing its task.
    ///
    /// Returns the removed context, or `None` if the id was unknown.
    pub fn remove(&self, id: &str) -> Option<Arc<AgentContext>> {
        let removed = write(&self.contexts).remove(id);
        if let Some(context) = &removed {
            if let Some(task) = context.task() {
                task.kill();
            }
        }
        removed
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        read(&self.contexts).len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        read(&self.contexts).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::BufferSink;
    use crate::memory::NoMemory;
    use crate::providers::ScriptedModel;

    fn test_context(id: Option<&str>) -> Arc<AgentContext> {
        AgentContext::new(
            Config::default(),
            Arc::new(ScriptedModel::new(vec!["ok"])),
            Arc::new(ToolRegistry::new()),
            Arc::new(NoMemory),
            Arc::new(BufferSink::new()),
            id,
        )
    }

    #[tokio::test]
    async fn test_context_has_root_agent() {
        let context = test_context(None);
        let root = context.root();
        assert_eq!(root.number, 0);
        assert_eq!(root.role, AgentContext::ROOT_ROLE);
        assert_eq!(root.depth, 0);
        assert!(root.superior.is_none());
    }

    #[tokio::test]
    async fn test_spawn_agent_links_superior() {
        let context = test_context(None);
        let root = context.root();
        let sub = context.spawn_agent("researcher", Some(root.id)).unwrap();

        assert_eq!(sub.number, 1);
        assert_eq!(sub.depth, 1);
        assert_eq!(sub.superior, Some(root.id));
        assert!(context.agent(sub.id).is_some());
    }

    #[tokio::test]
    async fn test_spawn_agent_depth_cap() {
        let mut config = Config::default();
        config.delegation.max_depth = 1;
        let context = AgentContext::new(
            config,
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(ToolRegistry::new()),
            Arc::new(NoMemory),
            Arc::new(BufferSink::new()),
            None,
        );

        let root = context.root();
        let sub = context.spawn_agent("a", Some(root.id)).unwrap();
        let err = context.spawn_agent("b", Some(sub.id)).unwrap_err();
        assert_eq!(err.kind(), "tool");
        assert!(err.to_string().contains("delegation refused"));
    }

    #[tokio::test]
    async fn test_reset_replaces_tree() {
        let context = test_context(None);
        let root = context.root();
        context.spawn_agent("helper", Some(root.id)).unwrap();
        let old_root_id = root.id;

        context.reset();

        let new_root = context.root();
        assert_eq!(new_root.number, 0);
        // old agents are gone; arena only holds the fresh root
        assert!(context.agent(old_root_id).is_some()); // same numeric id reused
        assert_eq!(new_root.role, AgentContext::ROOT_ROLE);
        assert!(context.streaming().is_none());
        assert!(!context.is_paused());
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = ContextRegistry::new();
        assert!(registry.is_empty());

        let a = test_context(Some("ctx-a"));
        let b = test_context(Some("ctx-b"));
        registry.insert(Arc::clone(&a)).unwrap();
        registry.insert(Arc::clone(&b)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("ctx-a").unwrap().id, "ctx-a");
        // first() returns the earliest created
        assert_eq!(registry.first().unwrap().id, a.id);

        assert!(registry.remove("ctx-a").is_some());
        assert!(registry.get("ctx-a").is_none());
        assert!(registry.remove("ctx-a").is_none());
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate_id() {
        let registry = ContextRegistry::new();
        registry.insert(test_context(Some("dup"))).unwrap();
        let err = registry.insert(test_context(Some("dup"))).unwrap_err();
        assert_eq!(err.kind(), "registry");
    }

    #[tokio::test]
    async fn test_registry_create_registers_context() {
        let registry = ContextRegistry::new();
        let context = registry
            .create(
                Config::default(),
                Arc::new(ScriptedModel::new(vec![])),
                Arc::new(ToolRegistry::new()),
                Arc::new(NoMemory),
                Arc::new(BufferSink::new()),
                Some("created"),
            )
            .unwrap();
        assert_eq!(context.id, "created");
        assert!(registry.get("created").is_some());
    }

    #[tokio::test]
    async fn test_communicate_starts_task() {
        let context = test_context(None);
        let task = context.communicate("hello", 1);
        let result = task.result().await.unwrap();
        // no workflow steps configured: loop exhausts immediately
        assert_eq!(result, crate::prompts::message_received());
    }
}
