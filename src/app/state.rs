use std::io::{self, Write};

use logscope_store::{
    FilteredView, IdleBatchScheduler, LogRecord, LogStore, Result, TickOutcome, ViewEvent,
    ViewId, ViewPredicate, ViewSet, ViewSubscription,
};

use super::Action;
use crate::ingest::IngestRecord;

/// Separator written when the view is rebuilt from scratch
pub const RESET_MARKER: &str = "----- view reset -----";

/// Global console state
///
/// Owns the store, its views and the scheduler. All mutation happens on the
/// console loop, one event at a time.
pub struct AppState {
    pub store: LogStore,

    pub views: ViewSet,

    pub scheduler: IdleBatchScheduler,

    /// View rendered to the output
    pub main_view: ViewId,

    /// Row notifications for the main view
    main_events: ViewSubscription,

    /// Rows of the main view already written
    printed: usize,

    /// Append source location to each row?
    pub extended: bool,

    /// Whether scheduled batch work may remain
    pub armed: bool,

    /// Whether app should quit
    pub should_quit: bool,

    /// Stats requested by a directive, pending output
    pub stats_requested: bool,
}

impl AppState {
    pub fn new(predicate: ViewPredicate, batch_size: usize, extended: bool) -> Result<Self> {
        let scheduler = IdleBatchScheduler::new(batch_size)?;
        let mut store = LogStore::new();
        let mut view = FilteredView::new(&mut store, predicate);
        let main_events = view.subscribe();

        let mut views = ViewSet::new();
        let main_view = views.insert(view);

        Ok(Self {
            store,
            views,
            scheduler,
            main_view,
            main_events,
            printed: 0,
            extended,
            armed: false,
            should_quit: false,
            stats_requested: false,
        })
    }

    /// Append an ingested record and schedule classification
    pub fn ingest(&mut self, record: &IngestRecord) {
        self.store.append(record.as_new_record());
        self.armed = true;
    }

    /// Apply a control action
    pub fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::SetProcessFilter(names) => {
                tracing::info!(processes = ?names, "process filter changed");
                self.views.get_mut(self.main_view)?.set_process_filter(names);
            }
            Action::SetSeverityFilter(mask) => {
                tracing::info!(mask = mask.bits(), "severity filter changed");
                self.views.get_mut(self.main_view)?.set_severity_filter(mask);
            }
            Action::ClearLogs => {
                self.store.clear();
            }
            Action::ShowStats => {
                self.stats_requested = true;
            }
            Action::Quit => {
                self.should_quit = true;
            }
        }
        self.armed = true;
        Ok(())
    }

    /// Run one scheduler tick over every view
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.scheduler.tick_all(&mut self.views, &self.store);
        self.armed = outcome == TickOutcome::Rearm;
        outcome
    }

    /// Classify everything pending, ignoring batch limits
    pub fn drain_all(&mut self) {
        while self.tick() == TickOutcome::Rearm {}
    }

    /// Write rows that became visible since the last render
    pub fn render<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let mut changed = false;
        while let Ok(event) = self.main_events.try_recv() {
            match event {
                ViewEvent::Reset => {
                    if self.printed > 0 {
                        writeln!(out, "{}", RESET_MARKER)?;
                    }
                    self.printed = 0;
                }
                ViewEvent::RowsAppended => changed = true,
            }
        }
        if !changed {
            return Ok(());
        }

        let view = self.views.get(self.main_view).map_err(io::Error::other)?;
        for index in self.printed..view.visible_count() {
            let record = view
                .visible_record_at(&self.store, index)
                .map_err(io::Error::other)?;
            let row = format_record(&self.store, record, self.extended).map_err(io::Error::other)?;
            writeln!(out, "{}", row)?;
        }
        self.printed = view.visible_count();
        Ok(())
    }

    /// Write per-process and per-severity counts
    pub fn write_stats<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "records: {}", self.store.len())?;
        if let Some(earliest) = self.store.earliest_timestamp() {
            writeln!(out, "earliest: {}", earliest.to_rfc3339())?;
        }
        for process in self.store.registry().processes_by_name() {
            let count = self
                .store
                .message_count(process.id)
                .map_err(io::Error::other)?;
            writeln!(out, "  {:<24} {}", process.name, count)?;
        }
        let counts = self.store.severity_counts();
        for severity in logscope_store::Severity::ALL {
            writeln!(out, "  {:<24} {}", severity.as_str(), counts.get(severity))?;
        }
        Ok(())
    }
}

/// Format a record as one output row; continuation lines are indented
pub fn format_record(store: &LogStore, record: &LogRecord, extended: bool) -> Result<String> {
    let process = store.process_name(record)?;
    let mut row = format!(
        "{} {} [{}]",
        record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        record.severity,
        process
    );

    let mut lines = record.lines.iter();
    if let Some(first) = lines.next() {
        row.push(' ');
        row.push_str(first);
    }

    if extended {
        let origin = store.registry().origin(record.origin)?;
        if !origin.file.is_empty() {
            row.push_str(&format!(" ({}:{}", origin.file, origin.line));
            if !origin.function.is_empty() {
                row.push(' ');
                row.push_str(&origin.function);
            }
            row.push(')');
        }
    }

    for line in lines {
        row.push_str("\n    ");
        row.push_str(line);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestRecord;
    use chrono::{TimeZone, Utc};
    use logscope_store::{Severity, SeverityMask};

    fn record(process: &str, severity: Severity, message: &str) -> IngestRecord {
        IngestRecord {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            severity,
            process: process.to_string(),
            file: "main.cpp".to_string(),
            function: "run".to_string(),
            line: 12,
            message: message.to_string(),
            seq: None,
        }
    }

    fn rendered(state: &mut AppState) -> String {
        let mut out = Vec::new();
        state.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_rows_render_once() {
        let mut state = AppState::new(ViewPredicate::all(), 2, false).unwrap();
        state.ingest(&record("a", Severity::Info, "one"));
        state.ingest(&record("b", Severity::Warn, "two"));
        state.ingest(&record("a", Severity::Error, "three"));

        assert_eq!(state.tick(), TickOutcome::Rearm);
        let first = rendered(&mut state);
        assert_eq!(first.lines().count(), 2);
        assert!(first.contains("INF [a] one"));

        state.drain_all();
        let second = rendered(&mut state);
        assert_eq!(second.lines().count(), 1);
        assert!(second.contains("ERR [a] three"));
        assert!(rendered(&mut state).is_empty());
    }

    #[test]
    fn test_filter_change_rerenders_with_marker() {
        let mut state = AppState::new(ViewPredicate::all(), 100, false).unwrap();
        state.ingest(&record("a", Severity::Info, "one"));
        state.ingest(&record("b", Severity::Warn, "two"));
        state.drain_all();
        rendered(&mut state);

        state
            .handle_action(Action::SetProcessFilter(vec!["b".to_string()]))
            .unwrap();
        state.drain_all();
        let out = rendered(&mut state);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], RESET_MARKER);
        assert!(lines[1].contains("[b] two"));
    }

    #[test]
    fn test_severity_action_and_clear() {
        let mut state = AppState::new(ViewPredicate::all(), 100, false).unwrap();
        state
            .handle_action(Action::SetSeverityFilter(SeverityMask::at_least(Severity::Warn)))
            .unwrap();
        state.ingest(&record("a", Severity::Info, "quiet"));
        state.ingest(&record("a", Severity::Fatal, "loud"));
        state.drain_all();
        let view = state.views.get(state.main_view).unwrap();
        assert_eq!(view.positions(), &[1]);

        state.handle_action(Action::ClearLogs).unwrap();
        state.drain_all();
        assert!(state.store.is_empty());
        assert_eq!(state.views.get(state.main_view).unwrap().visible_count(), 0);
    }

    #[test]
    fn test_format_record_extended_and_multiline() {
        let mut state = AppState::new(ViewPredicate::all(), 100, true).unwrap();
        state.ingest(&record("planner", Severity::Warn, "\nfirst\nsecond\n"));
        let record = state.store.record_at(0).unwrap();

        let row = format_record(&state.store, record, true).unwrap();
        assert_eq!(
            row,
            "2023-11-14T22:13:20.000Z WRN [planner] first (main.cpp:12 run)\n    second"
        );
    }

    #[test]
    fn test_write_stats() {
        let mut state = AppState::new(ViewPredicate::all(), 100, false).unwrap();
        state.ingest(&record("zeta", Severity::Info, "x"));
        state.ingest(&record("alpha", Severity::Info, "y"));
        state.ingest(&record("alpha", Severity::Error, "z"));

        let mut out = Vec::new();
        state.write_stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("records: 3\n"));
        let alpha = text.find("alpha").unwrap();
        let zeta = text.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(text.contains("ERR"));
    }

    #[test]
    fn test_quit_action() {
        let mut state = AppState::new(ViewPredicate::all(), 100, false).unwrap();
        state.handle_action(Action::Quit).unwrap();
        assert!(state.should_quit);
    }
}
