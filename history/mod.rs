/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bounded linear undo/redo history over full merged-graph snapshots.
//!
//! The history is a single stack with a cursor. The entry under the cursor is
//! the state currently shown; entries above it are redo steps. Committing
//! while the cursor is below the top discards those redo steps first.

use std::time::SystemTime;

use crate::graph::Graph;

/// Default bound on the number of retained snapshots.
pub const MAX_HISTORY_DEPTH: usize = 50;

/// Immutable deep copy of the merged graph at a point in time.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    graph: Graph,
    label: String,
    timestamp: SystemTime,
}

impl HistorySnapshot {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Human-readable action label ("Load", "Move node", ...).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct EditHistory {
    entries: Vec<HistorySnapshot>,
    cursor: usize,
    limit: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditHistory {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY_DEPTH)
    }

    /// A limit of 0 is treated as 1.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record a committed state. The graph is cloned, so later edits to the
    /// live collection never reach the stored snapshot.
    pub fn commit(&mut self, graph: &Graph, label: impl Into<String>) {
        if !self.entries.is_empty() && self.cursor + 1 < self.entries.len() {
            let discarded = self.entries.len() - (self.cursor + 1);
            self.entries.truncate(self.cursor + 1);
            log::debug!("history: discarded {discarded} redo step(s)");
        }
        self.entries.push(HistorySnapshot {
            graph: graph.clone(),
            label: label.into(),
            timestamp: SystemTime::now(),
        });
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(0..excess);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one snapshot. `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<Graph> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].graph.clone())
    }

    /// Step forward one snapshot. `None` at the newest entry.
    pub fn redo(&mut self) -> Option<Graph> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].graph.clone())
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.entries.get(self.cursor)
    }

    /// Labels oldest-first, for a history panel.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(HistorySnapshot::label).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
