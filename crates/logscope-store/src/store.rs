use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use logscope_types::{LogRecord, ProcessId, Severity, SeverityCounts, split_message};

use crate::error::{Result, StoreError};
use crate::registry::AttributeRegistry;

/// Change notifications published by the store
///
/// Events carry positions and ids only. Subscribers re-query the store for
/// anything else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// Records are available up to (excluding) position `len`
    TailExtended { len: usize },
    /// Every record and registry entry was discarded
    Cleared,
    /// A process name was seen for the first time
    ProcessAdded(ProcessId),
    /// The earliest timestamp in the store moved back
    EarliestTimestampChanged(DateTime<Utc>),
}

/// Receiving half of a store subscription
pub type StoreSubscription = mpsc::UnboundedReceiver<StoreEvent>;

/// A record as delivered by the ingestion side, before interning
#[derive(Clone, Debug)]
pub struct NewRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub process: &'a str,
    pub file: &'a str,
    pub function: &'a str,
    pub line: u32,
    pub message: &'a str,
    /// Producer sequence number; the store assigns one when absent
    pub seq: Option<u64>,
}

impl<'a> NewRecord<'a> {
    /// Create a record with empty source location
    pub fn new(
        timestamp: DateTime<Utc>,
        severity: Severity,
        process: &'a str,
        message: &'a str,
    ) -> Self {
        Self {
            timestamp,
            severity,
            process,
            file: "",
            function: "",
            line: 0,
            message,
            seq: None,
        }
    }

    /// Set the source location
    pub fn at(mut self, file: &'a str, function: &'a str, line: u32) -> Self {
        self.file = file;
        self.function = function;
        self.line = line;
        self
    }

    /// Set the producer sequence number
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// Append-only log record store
///
/// Owns the records and the attribute registry. Records are addressed by
/// position, which is stable until the next `clear`.
#[derive(Debug, Default)]
pub struct LogStore {
    registry: AttributeRegistry,

    records: Vec<LogRecord>,

    /// Smallest timestamp seen since the last clear
    earliest: Option<DateTime<Utc>>,

    /// Next store-assigned sequence number
    next_seq: u64,

    /// Records per process, indexed by process id
    message_counts: Vec<usize>,

    severity_counts: SeverityCounts,

    /// Bumped by every `clear`; shared with views so they can detect
    /// positions from an earlier generation before they sync
    generation: Arc<AtomicU64>,

    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to change notifications
    ///
    /// Dropping the receiver unsubscribes; the sender is pruned on the next
    /// notification.
    pub fn subscribe(&mut self) -> StoreSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Append a record and return its position
    pub fn append(&mut self, new: NewRecord<'_>) -> usize {
        let process = self.registry.intern_process(new.process);
        if process.is_new {
            self.message_counts.push(0);
            self.notify(StoreEvent::ProcessAdded(process.id));
        }

        let origin = match self.registry.intern_origin(
            new.severity,
            process.id,
            new.file,
            new.function,
            new.line,
        ) {
            Ok(origin) => origin.id,
            Err(e) => unreachable!("process interned above is missing: {e}"),
        };

        let seq = new.seq.unwrap_or(self.next_seq);
        self.next_seq = self.next_seq.max(seq.saturating_add(1));

        if self.earliest.is_none_or(|earliest| new.timestamp < earliest) {
            self.earliest = Some(new.timestamp);
            self.notify(StoreEvent::EarliestTimestampChanged(new.timestamp));
        }

        self.message_counts[process.id.index()] += 1;
        self.severity_counts.increment(new.severity);

        let position = self.records.len();
        self.records.push(LogRecord {
            timestamp: new.timestamp,
            severity: new.severity,
            process: process.id,
            origin,
            lines: split_message(new.message),
            seq,
        });

        self.notify(StoreEvent::TailExtended {
            len: self.records.len(),
        });
        position
    }

    /// Discard every record and the registry
    pub fn clear(&mut self) {
        tracing::debug!(records = self.records.len(), "clearing log store");
        self.records.clear();
        self.registry.clear();
        self.earliest = None;
        self.next_seq = 0;
        self.message_counts.clear();
        self.severity_counts = SeverityCounts::default();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.notify(StoreEvent::Cleared);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_at(&self, position: usize) -> Result<&LogRecord> {
        self.records
            .get(position)
            .ok_or_else(|| StoreError::out_of_range(position, self.records.len()))
    }

    /// Every record with its position, ignoring any filter
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LogRecord)> + '_ {
        self.records.iter().enumerate()
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Name of the process that produced `record`
    pub fn process_name(&self, record: &LogRecord) -> Result<&str> {
        self.registry.process_name(record.process)
    }

    pub fn earliest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.earliest
    }

    /// Number of records appended by `process` since the last clear
    pub fn message_count(&self, process: ProcessId) -> Result<usize> {
        self.message_counts
            .get(process.index())
            .copied()
            .ok_or_else(|| StoreError::not_found("process", process))
    }

    pub fn severity_counts(&self) -> &SeverityCounts {
        &self.severity_counts
    }

    /// Number of clears since the store was created
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Shared handle on the clear counter
    pub(crate) fn generation_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn notify(&mut self, event: StoreEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            tracing::debug!(dropped, "pruned closed store subscribers");
        }
    }
}
