//! Snapshot-based undo/redo
//!
//! Two bounded stacks of opaque snapshots. The controller never looks inside
//! a snapshot; restoring one is up to the caller.

use std::collections::VecDeque;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An immutable serialized canvas state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasSnapshot {
    pub taken_at: DateTime<Utc>,
    pub payload: Bytes,
}

impl CanvasSnapshot {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        CanvasSnapshot {
            taken_at: Utc::now(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<CanvasSnapshot>,
    redo: VecDeque<CanvasSnapshot>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        History {
            undo: VecDeque::with_capacity(capacity),
            redo: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record the state from before a mutating action
    ///
    /// A fresh action invalidates anything that could have been redone.
    pub fn push_undo(&mut self, snapshot: CanvasSnapshot) {
        Self::push_bounded(&mut self.undo, snapshot, self.capacity);
        self.redo.clear();
    }

    /// Step back: returns the snapshot to restore, stashing `current` for redo
    pub fn undo(&mut self, current: CanvasSnapshot) -> Option<CanvasSnapshot> {
        let previous = self.undo.pop_back()?;
        Self::push_bounded(&mut self.redo, current, self.capacity);
        Some(previous)
    }

    /// Step forward: returns the snapshot to restore, stashing `current` for undo
    pub fn redo(&mut self, current: CanvasSnapshot) -> Option<CanvasSnapshot> {
        let next = self.redo.pop_back()?;
        Self::push_bounded(&mut self.undo, current, self.capacity);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_bounded(stack: &mut VecDeque<CanvasSnapshot>, snapshot: CanvasSnapshot, capacity: usize) {
        if stack.len() == capacity {
            stack.pop_front();
        }
        stack.push_back(snapshot);
    }
}
