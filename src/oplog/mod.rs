//! Operation Log - optimistic local edits with undo/redo
//!
//! Edits are applied structurally on top of a base snapshot. Each entry on
//! the undo stack keeps the inverse captured when it was applied, so undo
//! never has to reconstruct lost state.
//!
//! Invariant: replaying the undo stack on top of the base reproduces the
//! current snapshot exactly.

mod apply;

use std::sync::Arc;

use tracing::debug;

use crate::error::SyncResult;
use crate::types::{GraphOperation, GraphSnapshot};

use apply::Inverse;

#[derive(Debug, Clone)]
struct Applied {
    op: GraphOperation,
    inverse: Inverse,
}

/// Local edit layer over one snapshot
#[derive(Debug, Clone)]
pub struct OperationLog {
    base: Arc<GraphSnapshot>,
    current: Arc<GraphSnapshot>,
    undo: Vec<Applied>,
    redo: Vec<GraphOperation>,
    /// Undo depth; 0 means unbounded
    max_history: usize,
}

impl OperationLog {
    pub fn new(snapshot: Arc<GraphSnapshot>, max_history: usize) -> Self {
        Self {
            base: snapshot.clone(),
            current: snapshot,
            undo: Vec::new(),
            redo: Vec::new(),
            max_history,
        }
    }

    /// Apply an edit to the current snapshot.
    ///
    /// Clears the redo stack. A rejected operation leaves the log untouched.
    pub fn apply(&mut self, op: GraphOperation) -> SyncResult<Arc<GraphSnapshot>> {
        let (next, inverse) = apply::apply(&self.current, &op)?;
        debug!(kind = op.kind(), target = op.target_id(), "operation applied");

        self.current = Arc::new(next);
        self.undo.push(Applied { op, inverse });
        self.redo.clear();
        self.fold_overflow()?;
        Ok(self.current.clone())
    }

    /// Revert the most recent edit; returns false if there was nothing to undo
    pub fn undo(&mut self) -> SyncResult<bool> {
        let Some(entry) = self.undo.pop() else {
            return Ok(false);
        };
        match apply::revert(&self.current, &entry.inverse) {
            Ok(previous) => {
                debug!(kind = entry.op.kind(), target = entry.op.target_id(), "operation undone");
                self.current = Arc::new(previous);
                self.redo.push(entry.op);
                Ok(true)
            }
            Err(e) => {
                self.undo.push(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone edit; returns false if there was nothing to redo
    pub fn redo(&mut self) -> SyncResult<bool> {
        let Some(op) = self.redo.pop() else {
            return Ok(false);
        };
        match apply::apply(&self.current, &op) {
            Ok((next, inverse)) => {
                debug!(kind = op.kind(), target = op.target_id(), "operation redone");
                self.current = Arc::new(next);
                self.undo.push(Applied { op, inverse });
                Ok(true)
            }
            Err(e) => {
                self.redo.push(op);
                Err(e)
            }
        }
    }

    /// Drop all pending edits and start over from an authoritative snapshot
    pub fn reset(&mut self, snapshot: Arc<GraphSnapshot>) {
        if !self.undo.is_empty() || !self.redo.is_empty() {
            debug!(
                discarded = self.undo.len(),
                redo = self.redo.len(),
                "operation log reset"
            );
        }
        self.base = snapshot.clone();
        self.current = snapshot;
        self.undo.clear();
        self.redo.clear();
    }

    pub fn current(&self) -> Arc<GraphSnapshot> {
        self.current.clone()
    }

    /// Snapshot the undo stack is replayed on
    pub fn base(&self) -> Arc<GraphSnapshot> {
        self.base.clone()
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

    /// Applied operations, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &GraphOperation> {
        self.undo.iter().map(|entry| &entry.op)
    }

    /// Rebuild the current snapshot from the base by replaying the undo stack
    pub fn replay(&self) -> SyncResult<GraphSnapshot> {
        let mut snapshot = self.base.as_ref().clone();
        for entry in &self.undo {
            snapshot = apply::apply(&snapshot, &entry.op)?.0;
        }
        Ok(snapshot)
    }

    fn fold_overflow(&mut self) -> SyncResult<()> {
        if self.max_history == 0 {
            return Ok(());
        }
        while self.undo.len() > self.max_history {
            let oldest = self.undo.remove(0);
            self.base = Arc::new(apply::apply(&self.base, &oldest.op)?.0);
        }
        Ok(())
    }
}
