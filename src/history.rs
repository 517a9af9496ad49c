//! Conversation history for one agent.
//!
//! History is an ordered list of turns with a strict alternation-friendly
//! shape: consecutive turns from the same role are merged into one entry
//! (content joined with a blank line) instead of appended separately.
//!
//! Compaction is split into pure helpers so the model-generated summary
//! stays outside this module: [`History::split_for_summary`] computes the
//! prefix/middle/suffix partition (repairing the middle to start on a
//! human turn and to have odd length), and [`History::apply_summary`]
//! rebuilds the history once the caller has obtained a summary. A failed
//! summarization therefore leaves the history untouched.

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A user or framework-authored turn.
    Human,
    /// A model-authored turn.
    Ai,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The author of this turn.
    pub role: Role,
    /// The text content of this turn.
    pub content: String,
}

impl Message {
    /// Create a human turn.
    pub fn human(content: &str) -> Self {
        Self {
            role: Role::Human,
            content: content.to_string(),
        }
    }

    /// Create an AI turn.
    pub fn ai(content: &str) -> Self {
        Self {
            role: Role::Ai,
            content: content.to_string(),
        }
    }
}

/// The partition produced by [`History::split_for_summary`].
///
/// `middle` is the segment to be replaced by a single summarized human
/// turn; `prefix` and `suffix` are preserved verbatim.
#[derive(Debug, Clone)]
pub struct CompactionSplit {
    /// Entries preserved at the start.
    pub prefix: Vec<Message>,
    /// The segment to summarize. Always starts with a human turn and has
    /// odd length when non-empty.
    pub middle: Vec<Message>,
    /// Entries preserved at the end.
    pub suffix: Vec<Message>,
}

/// Ordered conversation history with same-role merging.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text under a role.
    ///
    /// If the last entry has the same role, the text is merged into it
    /// with a blank-line separator and no new entry is created.
    ///
    /// # Returns
    /// `true` if a new entry was created, `false` if the text was merged.
    pub fn push(&mut self, text: &str, role: Role) -> bool {
        if let Some(last) = self.messages.last_mut() {
            if last.role == role {
                last.content.push_str("\n\n");
                last.content.push_str(text);
                return false;
            }
        }
        self.messages.push(Message {
            role,
            content: text.to_string(),
        });
        true
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history has no entries.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The entries in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last entry, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the history exceeds `max` entries.
    pub fn over_limit(&self, max: usize) -> bool {
        self.messages.len() > max
    }

    /// Render entries as `role: content` lines for the summarizer.
    pub fn concat(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Human => "human",
                    Role::Ai => "ai",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Partition the history for compaction.
    ///
    /// Keeps the first `keep_start` and last `keep_end` entries. The middle
    /// segment is repaired to start on a human turn — if it opens with an
    /// AI turn, the last prefix entry is borrowed into the middle — and
    /// trimmed by one trailing entry if its length is even, so the segment
    /// begins and ends human/ai-symmetrically for summarization.
    ///
    /// Returns `None` when `keep_start + keep_end` covers the whole
    /// history (nothing to summarize).
    pub fn split_for_summary(&self, keep_start: usize, keep_end: usize) -> Option<CompactionSplit> {
        if self.messages.len() <= keep_start + keep_end {
            return None;
        }

        let mut prefix = self.messages[..keep_start].to_vec();
        let suffix = self.messages[self.messages.len() - keep_end..].to_vec();
        let mut middle = self.messages[keep_start..self.messages.len() - keep_end].to_vec();

        if let Some(first) = middle.first() {
            if first.role != Role::Human {
                if let Some(borrowed) = prefix.pop() {
                    middle.insert(0, borrowed);
                }
            }
        }

        if middle.len() % 2 == 0 {
            middle.pop();
        }

        Some(CompactionSplit {
            prefix,
            middle,
            suffix,
        })
    }

    /// Replace the history with `prefix + [summary as human] + suffix`.
    ///
    /// An empty middle segment drops the synthesized turn entirely.
    pub fn apply_summary(&mut self, split: CompactionSplit, summary: &str) {
        let mut rebuilt = split.prefix;
        if !split.middle.is_empty() {
            rebuilt.push(Message::human(summary));
        }
        rebuilt.extend(split.suffix);
        self.messages = rebuilt;
    }
}
