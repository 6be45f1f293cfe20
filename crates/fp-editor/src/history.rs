//! Snapshot undo/redo history.
//!
//! Each entry is a whole [`GraphState`]. Because states are immutable and
//! share storage through `Arc`, keeping fifty of them costs only what the
//! edits between them changed.
//!
//! The history is a small state machine:
//!
//! ```text
//! Uninitialized --init/record--> Idle --undo/redo--> Replaying --> Idle
//! ```
//!
//! `record` is refused while `Replaying`, so a state swapped in by undo or
//! redo can never be pushed back as a new entry.

use fp_core::store::{GraphState, GraphStore};

/// Default cap on stored snapshots.
pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    /// No baseline yet; undo and redo are unavailable.
    Uninitialized,
    Idle,
    /// An undo or redo is swapping state into the store.
    Replaying,
}

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<GraphState>,
    cursor: usize,
    max_depth: usize,
    state: HistoryState,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            entries: Vec::with_capacity(max_depth),
            cursor: 0,
            max_depth,
            state: HistoryState::Uninitialized,
        }
    }

    pub fn state(&self) -> HistoryState {
        self.state
    }

    pub fn is_replaying(&self) -> bool {
        self.state == HistoryState::Replaying
    }

    /// Seed the baseline. Only the first call has an effect.
    pub fn init(&mut self, snapshot: GraphState) -> bool {
        if self.state != HistoryState::Uninitialized {
            return false;
        }
        self.entries.clear();
        self.entries.push(snapshot);
        self.cursor = 0;
        self.state = HistoryState::Idle;
        true
    }

    /// Push a snapshot, discarding any redo branch and evicting the oldest
    /// entry beyond the cap. Ignored while replaying.
    pub fn record(&mut self, snapshot: GraphState) -> bool {
        match self.state {
            HistoryState::Replaying => {
                log::trace!("history: record ignored during replay");
                return false;
            }
            HistoryState::Uninitialized => return self.init(snapshot),
            HistoryState::Idle => {}
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        if self.entries.len() > self.max_depth {
            let excess = self.entries.len() - self.max_depth;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
        true
    }

    /// Record `snapshot` unless it equals the current entry.
    pub fn ensure_current(&mut self, snapshot: GraphState) -> bool {
        if self.current() == Some(&snapshot) {
            return false;
        }
        self.record(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.state == HistoryState::Idle && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.state == HistoryState::Idle && self.cursor + 1 < self.entries.len()
    }

    /// Step back one entry and swap it into `store`. Returns `false` at
    /// the oldest entry.
    pub fn undo(&mut self, store: &mut GraphStore) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.replay(store, self.cursor - 1);
        true
    }

    /// Step forward one entry. Returns `false` at the newest entry.
    pub fn redo(&mut self, store: &mut GraphStore) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.replay(store, self.cursor + 1);
        true
    }

    fn replay(&mut self, store: &mut GraphStore, index: usize) {
        self.state = HistoryState::Replaying;
        self.cursor = index;
        store.replace(self.entries[index].clone());
        self.state = HistoryState::Idle;
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

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The entry the live state corresponds to.
    pub fn current(&self) -> Option<&GraphState> {
        self.entries.get(self.cursor)
    }
}
