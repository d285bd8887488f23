use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use logscope_types::{LogRecord, SeverityMask};

use crate::error::{Result, StoreError};
use crate::store::{LogStore, StoreEvent, StoreSubscription};

/// Which records a view admits
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewPredicate {
    /// Process names to admit (empty = all)
    pub processes: BTreeSet<String>,

    /// Severities to admit
    pub severities: SeverityMask,
}

impl ViewPredicate {
    /// Predicate admitting every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_processes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_severities(mut self, mask: SeverityMask) -> Self {
        self.severities = mask;
        self
    }

    /// Check a record against this predicate given its process name
    pub fn matches(&self, record: &LogRecord, process_name: &str) -> bool {
        self.severities.contains(record.severity)
            && (self.processes.is_empty() || self.processes.contains(process_name))
    }
}

/// Progress of a view relative to the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    /// Every known position is classified
    Idle,
    /// New tail positions are waiting under a stable predicate
    DrainingNew,
    /// The predicate changed and the backlog is being reclassified
    Rebuilding,
}

/// Notifications published by a view to its observers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// At least one row was appended to the visible sequence
    RowsAppended,
    /// The visible sequence was emptied and will be rebuilt
    Reset,
}

/// Receiving half of a view subscription
pub type ViewSubscription = mpsc::UnboundedReceiver<ViewEvent>;

/// Work done by one call to [`FilteredView::process_batch`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Positions classified
    pub classified: usize,
    /// Positions accepted into the view
    pub appended: usize,
}

/// Incrementally maintained filtered view over a [`LogStore`]
///
/// The view owns a strictly increasing list of store positions that pass its
/// predicate. Positions below `next_to_classify` have been classified; new
/// store growth and predicate changes only ever add work past that cursor or
/// reset it to zero, so no record is classified twice under one predicate.
pub struct FilteredView {
    predicate: ViewPredicate,

    /// Accepted store positions, strictly increasing
    included: Vec<usize>,

    /// First position not yet classified
    next_to_classify: usize,

    /// Store length as of the last applied notification
    target: usize,

    /// End of the backlog captured at the last predicate change
    rebuild_until: Option<usize>,

    /// Verdict per origin id under the current predicate
    verdicts: Vec<Option<bool>>,

    store_events: StoreSubscription,

    /// Store clear counter, and its value when positions were last valid
    generation: Arc<AtomicU64>,
    generation_seen: u64,

    observers: Vec<mpsc::UnboundedSender<ViewEvent>>,
}

impl FilteredView {
    /// Create a view over `store`; existing records are queued as a rebuild
    pub fn new(store: &mut LogStore, predicate: ViewPredicate) -> Self {
        let target = store.len();
        Self {
            predicate,
            included: Vec::new(),
            next_to_classify: 0,
            target,
            rebuild_until: (target > 0).then_some(target),
            verdicts: Vec::new(),
            store_events: store.subscribe(),
            generation: store.generation_handle(),
            generation_seen: store.generation(),
            observers: Vec::new(),
        }
    }

    /// Subscribe to row notifications
    pub fn subscribe(&mut self) -> ViewSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn predicate(&self) -> &ViewPredicate {
        &self.predicate
    }

    /// Replace the process allow-set and rebuild
    pub fn set_process_filter<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicate.processes = names.into_iter().map(Into::into).collect();
        self.rebuild();
    }

    /// Replace the severity mask and rebuild
    pub fn set_severity_filter(&mut self, mask: SeverityMask) {
        self.predicate.severities = mask;
        self.rebuild();
    }

    /// Replace the whole predicate and rebuild
    pub fn set_predicate(&mut self, predicate: ViewPredicate) {
        self.predicate = predicate;
        self.rebuild();
    }

    /// Number of visible rows; zero while a store clear is not yet applied
    pub fn visible_count(&self) -> usize {
        self.positions().len()
    }

    /// Store position behind a view index
    pub fn visible_position(&self, index: usize) -> Result<usize> {
        let positions = self.positions();
        positions
            .get(index)
            .copied()
            .ok_or_else(|| StoreError::out_of_range(index, positions.len()))
    }

    pub fn visible_record_at<'s>(&self, store: &'s LogStore, index: usize) -> Result<&'s LogRecord> {
        store.record_at(self.visible_position(index)?)
    }

    /// Accepted store positions in store order
    pub fn positions(&self) -> &[usize] {
        if self.is_stale() {
            return &[];
        }
        &self.included
    }

    pub fn next_to_classify(&self) -> usize {
        self.next_to_classify
    }

    /// State as of the last applied store notification
    pub fn state(&self) -> ViewState {
        match self.rebuild_until {
            Some(end) if self.next_to_classify < end => ViewState::Rebuilding,
            _ if self.next_to_classify < self.target => ViewState::DrainingNew,
            _ => ViewState::Idle,
        }
    }

    /// Apply pending store notifications and return the unclassified backlog
    pub fn pending_work(&mut self) -> usize {
        self.sync();
        self.target - self.next_to_classify
    }

    /// Apply pending store notifications without classifying anything
    pub fn sync(&mut self) {
        while let Ok(event) = self.store_events.try_recv() {
            match event {
                StoreEvent::TailExtended { len } => self.target = len,
                StoreEvent::Cleared => self.reset_for_clear(),
                StoreEvent::ProcessAdded(_) | StoreEvent::EarliestTimestampChanged(_) => {}
            }
        }
        self.generation_seen = self.generation.load(Ordering::SeqCst);
    }

    /// Whether the store was cleared after the positions were computed
    fn is_stale(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.generation_seen
    }

    /// Classify up to `limit` pending positions in store order
    pub fn process_batch(&mut self, store: &LogStore, limit: usize) -> BatchReport {
        self.sync();

        let start = self.next_to_classify;
        let end = self.target.min(store.len()).min(start.saturating_add(limit));
        if start >= end {
            return BatchReport::default();
        }

        let before = self.included.len();
        for position in start..end {
            let record = match store.record_at(position) {
                Ok(record) => record,
                Err(e) => unreachable!("position below store length is missing: {e}"),
            };
            if self.accepts(store, record) {
                debug_assert!(self.included.last().is_none_or(|&last| last < position));
                self.included.push(position);
            }
        }
        self.next_to_classify = end;

        if let Some(rebuild_end) = self.rebuild_until
            && end >= rebuild_end
        {
            self.rebuild_until = None;
            tracing::debug!(visible = self.included.len(), "view rebuild complete");
        }

        let report = BatchReport {
            classified: end - start,
            appended: self.included.len() - before,
        };
        tracing::trace!(
            classified = report.classified,
            appended = report.appended,
            pending = self.target - end,
            "processed view batch"
        );

        if report.appended > 0 {
            self.notify(ViewEvent::RowsAppended);
        }
        report
    }

    /// Classify everything currently pending in one pass
    pub fn drain(&mut self, store: &LogStore) -> BatchReport {
        let pending = self.pending_work();
        self.process_batch(store, pending)
    }

    fn accepts(&mut self, store: &LogStore, record: &LogRecord) -> bool {
        let slot = record.origin.index();
        if slot >= self.verdicts.len() {
            self.verdicts.resize(slot + 1, None);
        }
        if let Some(verdict) = self.verdicts[slot] {
            return verdict;
        }

        let name = match store.process_name(record) {
            Ok(name) => name,
            Err(e) => unreachable!("record references unregistered process: {e}"),
        };
        let verdict = self.predicate.matches(record, name);
        self.verdicts[slot] = Some(verdict);
        verdict
    }

    /// Discard all progress and queue every known position for classification
    fn rebuild(&mut self) {
        self.sync();
        tracing::debug!(
            backlog = self.target,
            processes = self.predicate.processes.len(),
            severities = self.predicate.severities.bits(),
            "view predicate changed, rebuilding"
        );
        self.included.clear();
        self.verdicts.clear();
        self.next_to_classify = 0;
        self.rebuild_until = (self.target > 0).then_some(self.target);
        self.notify(ViewEvent::Reset);
    }

    fn reset_for_clear(&mut self) {
        self.included.clear();
        self.verdicts.clear();
        self.next_to_classify = 0;
        self.target = 0;
        self.rebuild_until = None;
        self.notify(ViewEvent::Reset);
    }

    fn notify(&mut self, event: ViewEvent) {
        self.observers.retain(|tx| tx.send(event).is_ok());
    }
}

impl std::fmt::Debug for FilteredView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredView")
            .field("predicate", &self.predicate)
            .field("visible", &self.included.len())
            .field("next_to_classify", &self.next_to_classify)
            .field("target", &self.target)
            .field("state", &self.state())
            .finish()
    }
}
