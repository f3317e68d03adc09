//! Tool-call chunk buffer (C3) — `spec.md` §4.3.
//!
//! Providers stream a tool call as fragments sharing a chunk id: a fragment
//! may carry a name, an argument-text slice, or an end-of-call marker. This
//! buffer reassembles fragments into a single dispatch per chunk id, even
//! if fragments (or the whole call) are re-delivered.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One streamed fragment of a tool call.
#[derive(Debug, Clone, Default)]
pub struct ChunkFragment {
    pub chunk_id: String,
    pub name: Option<String>,
    pub args_piece: Option<String>,
    /// Provider-signalled end of this specific tool call.
    pub end_of_call: bool,
    /// The top-level message's chunk position, e.g. `Some("last")` for the
    /// final content block of an assistant message.
    pub chunk_position: Option<String>,
}

/// A fully assembled tool call, ready to dispatch.
#[derive(Debug, Clone)]
pub struct CompletedToolCall {
    pub chunk_id: String,
    pub name: String,
    /// Parsed JSON arguments; `{}` if the accumulated text failed to parse.
    pub args: Value,
    /// The raw accumulated argument text, retained for display even when
    /// `args` fell back to `{}`.
    pub raw_args: String,
}

#[derive(Default)]
struct PendingCall {
    name: Option<String>,
    args_text: String,
}

/// Reassembles streamed tool-call fragments and guarantees exactly one
/// dispatch per chunk id per turn (`spec.md` §4.3, Invariant 2).
#[derive(Default)]
pub struct ToolCallChunkBuffer {
    pending: HashMap<String, PendingCall>,
    displayed: HashSet<String>,
}

impl ToolCallChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment. Returns `Some(call)` the first time this chunk id
    /// becomes complete; `None` otherwise, including on every fragment
    /// received for a chunk id that was already dispatched.
    pub fn feed(&mut self, fragment: ChunkFragment) -> Option<CompletedToolCall> {
        if self.displayed.contains(&fragment.chunk_id) {
            return None;
        }

        let entry = self.pending.entry(fragment.chunk_id.clone()).or_default();
        if let Some(name) = fragment.name {
            if entry.name.is_none() && !name.is_empty() {
                entry.name = Some(name);
            }
        }
        if let Some(piece) = fragment.args_piece {
            entry.args_text.push_str(&piece);
        }

        let is_last_block = fragment.chunk_position.as_deref() == Some("last");
        let complete = fragment.end_of_call
            || (is_last_block && entry.name.is_some() && !entry.args_text.is_empty());

        if !complete {
            return None;
        }

        self.displayed.insert(fragment.chunk_id.clone());
        let pending = self.pending.remove(&fragment.chunk_id).unwrap_or_default();
        let name = pending.name.unwrap_or_default();
        let args = serde_json::from_str(&pending.args_text).unwrap_or_else(|_| Value::Object(Default::default()));

        Some(CompletedToolCall {
            chunk_id: fragment.chunk_id,
            name,
            args,
            raw_args: pending.args_text,
        })
    }

    /// Whether `chunk_id` has already been dispatched this turn.
    pub fn is_displayed(&self, chunk_id: &str) -> bool {
        self.displayed.contains(chunk_id)
    }
}
