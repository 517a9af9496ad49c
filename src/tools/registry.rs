//! Tool registry: validated name → implementation lookup.
//!
//! Tool names arrive from untrusted model text, so resolution never
//! fails: an unresolvable name maps to the [`UnknownTool`] sentinel,
//! whose response tells the model which names are valid.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{OverseerError, Result};

use super::{Tool, UnknownTool};

/// A registry that holds and resolves tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    unknown: Arc<dyn Tool>,
}

impl ToolRegistry {
    /// Create a registry containing only the unknown-tool sentinel.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            unknown: Arc::new(UnknownTool::default()),
        }
    }

    /// Register a tool.
    ///
    /// Names are validated at registration time: empty or duplicate
    /// names are rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(OverseerError::Tool("tool name must not be empty".into()));
        }
        if self.tools.contains_key(&name) {
            return Err(OverseerError::Tool(format!(
                "tool \"{}\" is already registered",
                name
            )));
        }
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Resolve a name to a tool.
    ///
    /// Always succeeds: unresolvable names return the unknown sentinel.
    pub fn resolve(&self, name: &str) -> Arc<dyn Tool> {
        match self.tools.get(name) {
            Some(tool) => Arc::clone(tool),
            None => Arc::clone(&self.unknown),
        }
    }

    /// Whether a tool with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
