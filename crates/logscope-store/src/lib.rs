//! Incremental log store for logscope
//!
//! This crate provides the append-only record store with its deduplicating
//! attribute registry, filtered views that follow the store incrementally,
//! and the batch scheduler that drives them in bounded steps.

mod error;
mod registry;
mod scheduler;
mod store;
mod view;
mod views;

pub use error::{Result, StoreError};
pub use registry::{AttributeRegistry, Interned};
pub use scheduler::{DEFAULT_BATCH_SIZE, IdleBatchScheduler, TickOutcome};
pub use store::{LogStore, NewRecord, StoreEvent, StoreSubscription};
pub use view::{BatchReport, FilteredView, ViewEvent, ViewPredicate, ViewState, ViewSubscription};
pub use views::{ViewId, ViewSet};

// Re-export types used in our public API
pub use logscope_types::{
    LogRecord, OriginId, OriginRecord, ProcessId, ProcessRecord, Severity, SeverityCounts,
    SeverityMask,
};
