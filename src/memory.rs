//! Memory recall collaborator.
//!
//! The auto-memory step consults an opaque text-returning backend. The
//! core never interprets the result beyond splicing it into the system
//! prompt; recall failures are rendered as empty context by the caller,
//! never propagated into the loop.

use async_trait::async_trait;

use crate::error::Result;

/// Opaque memory search backend.
#[async_trait]
pub trait MemoryRecall: Send + Sync {
    /// Search memories relevant to `query` (typically the rendered
    /// conversation history) and return them as free-form text.
    ///
    /// `count` is the number of memories requested; backends may return
    /// fewer. An empty string means nothing relevant was found.
    async fn recall(&self, query: &str, count: u32) -> Result<String>;
}

/// Backend that never recalls anything. Used when auto-memory is
/// disabled or no real backend is wired in.
#[derive(Debug, Default)]
pub struct NoMemory;

#[async_trait]
impl MemoryRecall for NoMemory {
    async fn recall(&self, _query: &str, _count: u32) -> Result<String> {
        Ok(String::new())
    }
}
