//! Undo/redo over whole-network mementos
//!
//! The manager keeps two stacks of named checkpoints. Every checkpoint
//! holds a memento of the network *after* its action, so undoing means
//! clearing the network and loading the memento below the undone item
//! (or the initial state when the stack runs out).
//!
//! The manager never touches a network directly. It drives a `NetworkIo`
//! collaborator, which lets hosts and tests plug in anything that can save,
//! load and clear.

use std::collections::VecDeque;

use crate::error::Result;
use crate::types::{ConnectionId, ModuleId, ModuleTypeId};

/// Default number of undo items kept
pub const DEFAULT_MAX_ITEMS: usize = 100;

/// Save/load/clear access to a network
pub trait NetworkIo {
    type Memento: Clone;

    fn save_network(&self) -> Result<Self::Memento>;

    fn load_network(&mut self, memento: &Self::Memento) -> Result<()>;

    fn clear(&mut self);
}

/// A named checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceItem<M> {
    name: String,
    memento: M,
}

impl<M> ProvenanceItem<M> {
    pub fn new(name: impl Into<String>, memento: M) -> Self {
        Self {
            name: name.into(),
            memento,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memento(&self) -> &M {
        &self.memento
    }
}

/// Standard checkpoint names for network actions
pub mod names {
    use super::*;

    pub fn module_added(id: &ModuleId) -> String {
        format!("Module Added: {}", id)
    }

    pub fn module_removed(id: &ModuleId) -> String {
        format!("Module Removed: {}", id)
    }

    pub fn connection_added(id: &ConnectionId) -> String {
        format!("Connection Added: {}", id)
    }

    pub fn connection_removed(id: &ConnectionId) -> String {
        format!("Connection Removed: {}", id)
    }

    pub fn module_replaced(old: &ModuleId, new_type: &ModuleTypeId) -> String {
        format!("Module Replaced: {} -> {}", old, new_type.name)
    }
}

/// Undo/redo stacks driving a `NetworkIo` collaborator
pub struct ProvenanceManager<IO: NetworkIo> {
    io: IO,
    undo_stack: VecDeque<ProvenanceItem<IO::Memento>>,
    redo_stack: Vec<ProvenanceItem<IO::Memento>>,
    initial_state: Option<IO::Memento>,
    max_items: usize,
}

impl<IO: NetworkIo> ProvenanceManager<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            io,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            initial_state: None,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Keep at most `max_items` undo items (at least 1)
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.set_max_items(max_items);
        self
    }

    pub fn set_max_items(&mut self, max_items: usize) {
        self.max_items = max_items.max(1);
        self.trim();
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_io(self) -> IO {
        self.io
    }

    /// State undo lands on once every item is undone
    pub fn set_initial_state(&mut self, memento: Option<IO::Memento>) {
        self.initial_state = memento;
    }

    pub fn initial_state(&self) -> Option<&IO::Memento> {
        self.initial_state.as_ref()
    }

    /// Push a checkpoint; any redo history is discarded
    pub fn add_item(&mut self, item: ProvenanceItem<IO::Memento>) {
        log::debug!("Provenance checkpoint: {}", item.name);
        self.undo_stack.push_back(item);
        self.redo_stack.clear();
        self.trim();
    }

    /// Save the collaborator's current network as a checkpoint
    pub fn record(&mut self, name: impl Into<String>) -> Result<()> {
        let memento = self.io.save_network()?;
        self.add_item(ProvenanceItem::new(name, memento));
        Ok(())
    }

    /// Apply an action to the collaborator, then checkpoint the result
    ///
    /// Nothing is recorded when the action fails.
    pub fn record_action<T, F>(&mut self, name: impl Into<String>, action: F) -> Result<T>
    where
        F: FnOnce(&mut IO) -> Result<T>,
    {
        let value = action(&mut self.io)?;
        self.record(name)?;
        Ok(value)
    }

    /// Undo the most recent checkpoint
    ///
    /// Returns `None` without touching the collaborator when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<Option<ProvenanceItem<IO::Memento>>> {
        let Some(item) = self.undo_stack.pop_back() else {
            return Ok(None);
        };
        self.redo_stack.push(item.clone());

        self.io.clear();
        let target = self
            .undo_stack
            .back()
            .map(|top| &top.memento)
            .or(self.initial_state.as_ref());
        if let Some(memento) = target {
            self.io.load_network(memento)?;
        }
        Ok(Some(item))
    }

    /// Redo the most recently undone checkpoint
    pub fn redo(&mut self) -> Result<Option<ProvenanceItem<IO::Memento>>> {
        let Some(item) = self.redo_stack.pop() else {
            return Ok(None);
        };
        self.undo_stack.push_back(item.clone());

        self.io.clear();
        self.io.load_network(&item.memento)?;
        Ok(Some(item))
    }

    /// Undo everything with a single clear and at most one load
    ///
    /// Items are returned most recent first.
    pub fn undo_all(&mut self) -> Result<Vec<ProvenanceItem<IO::Memento>>> {
        if self.undo_stack.is_empty() {
            return Ok(Vec::new());
        }

        let mut undone = Vec::with_capacity(self.undo_stack.len());
        while let Some(item) = self.undo_stack.pop_back() {
            self.redo_stack.push(item.clone());
            undone.push(item);
        }

        self.io.clear();
        if let Some(initial) = &self.initial_state {
            self.io.load_network(initial)?;
        }
        Ok(undone)
    }

    /// Redo everything with a single clear and one load
    ///
    /// Items are returned oldest first.
    pub fn redo_all(&mut self) -> Result<Vec<ProvenanceItem<IO::Memento>>> {
        if self.redo_stack.is_empty() {
            return Ok(Vec::new());
        }

        let mut redone = Vec::with_capacity(self.redo_stack.len());
        while let Some(item) = self.redo_stack.pop() {
            self.undo_stack.push_back(item.clone());
            redone.push(item);
        }
        self.trim();

        self.io.clear();
        if let Some(latest) = redone.last() {
            self.io.load_network(&latest.memento)?;
        }
        Ok(redone)
    }

    /// Forget all history without touching the collaborator
    pub fn clear_all(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_size(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_size(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo items, oldest first
    pub fn undo_items(&self) -> impl Iterator<Item = &ProvenanceItem<IO::Memento>> {
        self.undo_stack.iter()
    }

    /// Redo items, next to redo last
    pub fn redo_items(&self) -> impl Iterator<Item = &ProvenanceItem<IO::Memento>> {
        self.redo_stack.iter()
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_items {
            if let Some(oldest) = self.undo_stack.pop_front() {
                log::debug!("Provenance capacity reached, folding '{}' into initial state", oldest.name);
                self.initial_state = Some(oldest.memento);
            }
        }
    }
}
