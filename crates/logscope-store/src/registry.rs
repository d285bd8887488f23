use std::collections::{BTreeMap, HashMap};

use logscope_types::{OriginId, OriginRecord, ProcessId, ProcessRecord, Severity};

use crate::error::{Result, StoreError};

/// Outcome of an intern call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interned<T> {
    pub id: T,
    /// Whether this call allocated the id
    pub is_new: bool,
}

/// Deduplicating registry of processes and origins
///
/// Ids are dense and assigned in arrival order. Nothing is ever removed
/// short of a full `clear`, so the next free id is always the current count.
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    /// Processes indexed by id
    processes: Vec<ProcessRecord>,

    /// Name to id, iterated in display (alphabetical) order
    by_name: BTreeMap<String, ProcessId>,

    /// Origins indexed by id
    origins: Vec<OriginRecord>,

    /// Origins bucketed by the fixed-size part of their key; file and
    /// function are compared within the bucket so hits never allocate
    origin_buckets: HashMap<(Severity, ProcessId, u32), Vec<OriginId>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, registering it if unseen
    pub fn intern_process(&mut self, name: &str) -> Interned<ProcessId> {
        if let Some(&id) = self.by_name.get(name) {
            return Interned { id, is_new: false };
        }

        let id = ProcessId(self.processes.len() as u32);
        self.processes.push(ProcessRecord {
            id,
            name: name.to_string(),
        });
        self.by_name.insert(name.to_string(), id);
        Interned { id, is_new: true }
    }

    /// Return the id for the origin tuple, registering it if unseen
    ///
    /// Fails with `NotFound` if `process` was never registered.
    pub fn intern_origin(
        &mut self,
        severity: Severity,
        process: ProcessId,
        file: &str,
        function: &str,
        line: u32,
    ) -> Result<Interned<OriginId>> {
        self.process(process)?;

        let bucket = self
            .origin_buckets
            .entry((severity, process, line))
            .or_default();

        let origins = &self.origins;
        if let Some(&id) = bucket.iter().find(|id| {
            let origin = &origins[id.index()];
            origin.file == file && origin.function == function
        }) {
            return Ok(Interned { id, is_new: false });
        }

        let id = OriginId(self.origins.len() as u32);
        self.origins.push(OriginRecord {
            id,
            severity,
            process,
            file: file.to_string(),
            function: function.to_string(),
            line,
        });
        bucket.push(id);
        Ok(Interned { id, is_new: true })
    }

    pub fn process(&self, id: ProcessId) -> Result<&ProcessRecord> {
        self.processes
            .get(id.index())
            .ok_or_else(|| StoreError::not_found("process", id))
    }

    pub fn process_name(&self, id: ProcessId) -> Result<&str> {
        self.process(id).map(|p| p.name.as_str())
    }

    /// Look up a process by name without registering it
    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.by_name.get(name).copied()
    }

    pub fn origin(&self, id: OriginId) -> Result<&OriginRecord> {
        self.origins
            .get(id.index())
            .ok_or_else(|| StoreError::not_found("origin", id))
    }

    /// Known processes in alphabetical order of name
    pub fn processes_by_name(&self) -> impl Iterator<Item = &ProcessRecord> + '_ {
        self.by_name
            .values()
            .map(|id| &self.processes[id.index()])
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    /// Forget every process and origin
    pub fn clear(&mut self) {
        self.processes.clear();
        self.by_name.clear();
        self.origins.clear();
        self.origin_buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_intern_process_is_idempotent() {
        let mut registry = AttributeRegistry::new();
        let first = registry.intern_process("talker");
        let second = registry.intern_process("talker");

        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.id, second.id);
        assert_eq!(registry.process_count(), 1);
    }

    #[test]
    fn test_distinct_ids_match_distinct_names() {
        let mut registry = AttributeRegistry::new();
        let names = ["b", "a", "c", "a", "b", "d", "a"];
        let ids: HashSet<ProcessId> = names
            .iter()
            .map(|n| registry.intern_process(n).id)
            .collect();
        let distinct: HashSet<&str> = names.iter().copied().collect();

        assert_eq!(ids.len(), distinct.len());
        assert_eq!(registry.process_count(), distinct.len());
    }

    #[test]
    fn test_ids_are_dense_in_arrival_order() {
        let mut registry = AttributeRegistry::new();
        assert_eq!(registry.intern_process("zeta").id, ProcessId(0));
        assert_eq!(registry.intern_process("alpha").id, ProcessId(1));
        assert_eq!(registry.intern_process("mid").id, ProcessId(2));
    }

    #[test]
    fn test_processes_by_name_is_alphabetical() {
        let mut registry = AttributeRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.intern_process(name);
        }

        let names: Vec<&str> = registry
            .processes_by_name()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_origin_dedup_on_full_tuple() {
        let mut registry = AttributeRegistry::new();
        let p = registry.intern_process("node").id;
        let q = registry.intern_process("other").id;

        let base = registry
            .intern_origin(Severity::Info, p, "main.cpp", "run", 10)
            .unwrap();
        let same = registry
            .intern_origin(Severity::Info, p, "main.cpp", "run", 10)
            .unwrap();
        assert!(base.is_new);
        assert!(!same.is_new);
        assert_eq!(base.id, same.id);

        let variants = [
            registry.intern_origin(Severity::Warn, p, "main.cpp", "run", 10),
            registry.intern_origin(Severity::Info, q, "main.cpp", "run", 10),
            registry.intern_origin(Severity::Info, p, "other.cpp", "run", 10),
            registry.intern_origin(Severity::Info, p, "main.cpp", "stop", 10),
            registry.intern_origin(Severity::Info, p, "main.cpp", "run", 11),
        ];
        let mut ids = HashSet::new();
        ids.insert(base.id);
        for variant in variants {
            let interned = variant.unwrap();
            assert!(interned.is_new);
            ids.insert(interned.id);
        }
        assert_eq!(ids.len(), 6);
        assert_eq!(registry.origin_count(), 6);
    }

    #[test]
    fn test_origin_resolves_full_tuple() {
        let mut registry = AttributeRegistry::new();
        let p = registry.intern_process("node").id;
        let id = registry
            .intern_origin(Severity::Error, p, "io.rs", "flush", 42)
            .unwrap()
            .id;

        let origin = registry.origin(id).unwrap();
        assert_eq!(origin.severity, Severity::Error);
        assert_eq!(origin.process, p);
        assert_eq!(origin.file, "io.rs");
        assert_eq!(origin.function, "flush");
        assert_eq!(origin.line, 42);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let mut registry = AttributeRegistry::new();
        assert!(matches!(
            registry.process(ProcessId(3)),
            Err(StoreError::NotFound { kind: "process", .. })
        ));
        assert!(matches!(
            registry.origin(OriginId(0)),
            Err(StoreError::NotFound { kind: "origin", .. })
        ));
        assert!(matches!(
            registry.intern_origin(Severity::Info, ProcessId(9), "f", "g", 1),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(registry.process_id("ghost"), None);
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut registry = AttributeRegistry::new();
        registry.intern_process("a");
        let b = registry.intern_process("b").id;
        registry.intern_origin(Severity::Info, b, "f", "g", 1).unwrap();

        registry.clear();
        assert_eq!(registry.process_count(), 0);
        assert_eq!(registry.origin_count(), 0);
        assert!(registry.process(b).is_err());
        assert_eq!(registry.intern_process("b").id, ProcessId(0));
    }
}
