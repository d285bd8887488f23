use crate::error::{Result, StoreError};
use crate::store::LogStore;
use crate::view::FilteredView;
use crate::views::ViewSet;

/// Default number of positions classified per tick
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Whether a tick left work behind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No view has pending work
    Idle,
    /// Work remains; schedule another tick
    Rearm,
}

/// Cooperative chunked driver for view classification
///
/// Each tick classifies at most `batch_size` positions per view and returns,
/// so a host loop can interleave ingestion and input handling between ticks.
#[derive(Debug)]
pub struct IdleBatchScheduler {
    batch_size: usize,

    /// Ticks that did work
    invocations: u64,
}

impl IdleBatchScheduler {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(StoreError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batch_size,
            invocations: 0,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of ticks that classified at least one position
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Run one bounded step for a single view
    pub fn tick(&mut self, view: &mut FilteredView, store: &LogStore) -> TickOutcome {
        if view.pending_work() == 0 {
            return TickOutcome::Idle;
        }

        let report = view.process_batch(store, self.batch_size);
        if report.classified > 0 {
            self.invocations += 1;
        }

        if view.pending_work() > 0 {
            TickOutcome::Rearm
        } else {
            TickOutcome::Idle
        }
    }

    /// Run one bounded step for every view with pending work, in set order
    pub fn tick_all(&mut self, views: &mut ViewSet, store: &LogStore) -> TickOutcome {
        let mut outcome = TickOutcome::Idle;
        for (id, view) in views.iter_mut() {
            if self.tick(view, store) == TickOutcome::Rearm {
                tracing::trace!(view = %id, "view rearmed");
                outcome = TickOutcome::Rearm;
            }
        }
        outcome
    }
}

impl Default for IdleBatchScheduler {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            invocations: 0,
        }
    }
}
