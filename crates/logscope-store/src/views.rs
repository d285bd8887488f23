use std::fmt;

use crate::error::{Result, StoreError};
use crate::view::FilteredView;

/// Handle for a view held by a [`ViewSet`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(pub u32);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Ordered collection of views owned by the host
///
/// Order is the scheduling priority used by
/// [`IdleBatchScheduler::tick_all`](crate::IdleBatchScheduler::tick_all).
#[derive(Debug, Default)]
pub struct ViewSet {
    next_id: u32,
    entries: Vec<(ViewId, FilteredView)>,
}

impl ViewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view at the lowest priority
    pub fn insert(&mut self, view: FilteredView) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, view));
        id
    }

    pub fn get(&self, id: ViewId) -> Result<&FilteredView> {
        self.entries
            .iter()
            .find(|(vid, _)| *vid == id)
            .map(|(_, view)| view)
            .ok_or_else(|| StoreError::not_found("view", id))
    }

    pub fn get_mut(&mut self, id: ViewId) -> Result<&mut FilteredView> {
        self.entries
            .iter_mut()
            .find(|(vid, _)| *vid == id)
            .map(|(_, view)| view)
            .ok_or_else(|| StoreError::not_found("view", id))
    }

    pub fn remove(&mut self, id: ViewId) -> Result<FilteredView> {
        let index = self.index_of(id).ok_or_else(|| StoreError::not_found("view", id))?;
        Ok(self.entries.remove(index).1)
    }

    /// Move a view to `index` in scheduling order
    pub fn move_to(&mut self, id: ViewId, index: usize) -> Result<()> {
        let from = self
            .index_of(id)
            .ok_or_else(|| StoreError::InvalidTransition(format!("cannot move {id}: no such view")))?;
        if index >= self.entries.len() {
            return Err(StoreError::out_of_range(index, self.entries.len()));
        }

        let entry = self.entries.remove(from);
        self.entries.insert(index, entry);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &FilteredView)> + '_ {
        self.entries.iter().map(|(id, view)| (*id, view))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ViewId, &mut FilteredView)> + '_ {
        self.entries.iter_mut().map(|(id, view)| (*id, view))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_of(&self, id: ViewId) -> Option<usize> {
        self.entries.iter().position(|(vid, _)| *vid == id)
    }
}
