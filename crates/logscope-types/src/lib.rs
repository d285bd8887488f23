//! Shared types for logscope
//!
//! This crate contains the plain data carried between the store, its views and
//! the console host. Records refer to processes and origins by small integer
//! ids; the attribute tuples themselves live once in the store's registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Severity
// ============================================================================

/// Log severity level, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    /// Parse a severity from common spellings
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" | "debug" | "dbg" | "debg" => Some(Self::Debug),
            "info" | "inf" | "information" => Some(Self::Info),
            "warn" | "warning" | "wrn" => Some(Self::Warn),
            "error" | "err" | "erro" => Some(Self::Error),
            "fatal" | "panic" | "critical" | "crit" | "ftl" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Convert from the bit-valued levels used by ROS-style loggers (1, 2, 4, 8, 16)
    pub fn from_level_bit(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            4 => Some(Self::Warn),
            8 => Some(Self::Error),
            16 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Ordinal used for mask tests (`1 << ordinal`)
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Short display string (3 chars)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warn => "WRN",
            Self::Error => "ERR",
            Self::Fatal => "FTL",
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        Self::parse(&s).ok_or_else(|| format!("unknown severity '{}'", s))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask over severities; bit `n` admits the severity with ordinal `n`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityMask(u8);

impl SeverityMask {
    /// Admits nothing
    pub const NONE: SeverityMask = SeverityMask(0);

    /// Admits every severity
    pub const ALL: SeverityMask = SeverityMask(0x1f);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Mask admitting `min` and everything more severe
    pub fn at_least(min: Severity) -> Self {
        Severity::ALL
            .into_iter()
            .filter(|s| *s >= min)
            .collect()
    }

    /// Return a copy that also admits `severity`
    pub fn with(self, severity: Severity) -> Self {
        Self(self.0 | (1 << severity.ordinal()))
    }

    /// Return a copy that no longer admits `severity`
    pub fn without(self, severity: Severity) -> Self {
        Self(self.0 & !(1 << severity.ordinal()))
    }

    pub fn contains(self, severity: Severity) -> bool {
        (1u8 << severity.ordinal()) & self.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for SeverityMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromIterator<Severity> for SeverityMask {
    fn from_iter<I: IntoIterator<Item = Severity>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Counts per severity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
}

impl SeverityCounts {
    pub fn increment(&mut self, severity: Severity) {
        *self.slot(severity) += 1;
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Debug => self.debug,
            Severity::Info => self.info,
            Severity::Warn => self.warn,
            Severity::Error => self.error,
            Severity::Fatal => self.fatal,
        }
    }

    pub fn total(&self) -> usize {
        self.debug + self.info + self.warn + self.error + self.fatal
    }

    fn slot(&mut self, severity: Severity) -> &mut usize {
        match severity {
            Severity::Debug => &mut self.debug,
            Severity::Info => &mut self.info,
            Severity::Warn => &mut self.warn,
            Severity::Error => &mut self.error,
            Severity::Fatal => &mut self.fatal,
        }
    }
}

// ============================================================================
// Registry Identities
// ============================================================================

/// Stable identity of a named process (a "node")
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

/// Stable identity of a deduplicated origin tuple
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OriginId(pub u32);

impl ProcessId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl OriginId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process#{}", self.0)
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "origin#{}", self.0)
    }
}

/// A registered process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub name: String,
}

/// Where a record was logged from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginRecord {
    pub id: OriginId,
    pub severity: Severity,
    pub process: ProcessId,
    pub file: String,
    pub function: String,
    pub line: u32,
}

// ============================================================================
// Log Records
// ============================================================================

/// A single log record as held by the store
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Producer timestamp
    pub timestamp: DateTime<Utc>,

    /// Severity, duplicated from the origin for cheap filtering
    pub severity: Severity,

    /// Originating process
    pub process: ProcessId,

    /// Deduplicated origin tuple
    pub origin: OriginId,

    /// Message split into display lines
    pub lines: Vec<String>,

    /// Monotonic sequence number
    pub seq: u64,
}

impl LogRecord {
    /// Message text with display lines rejoined
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// First display line, or an empty string for a blank message
    pub fn headline(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }
}

/// Split a raw message into display lines, dropping empty lines at both ends
pub fn split_message(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].iter().map(|l| l.to_string()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Error < Severity::Fatal);
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warn));
        assert_eq!(Severity::parse("crit"), Some(Severity::Fatal));
        assert_eq!(Severity::parse("verbose"), None);
        assert_eq!(Severity::from_level_bit(8), Some(Severity::Error));
        assert_eq!(Severity::from_level_bit(3), None);
    }

    #[test]
    fn test_severity_try_from_accepts_parse_spellings() {
        for (text, expected) in [
            ("debg", Severity::Debug),
            ("trace", Severity::Debug),
            ("Information", Severity::Info),
            ("wrn", Severity::Warn),
            ("erro", Severity::Error),
            ("crit", Severity::Fatal),
            ("ftl", Severity::Fatal),
        ] {
            assert_eq!(Severity::try_from(text.to_string()), Ok(expected));
        }
        assert_eq!(
            Severity::try_from("verbose".to_string()),
            Err("unknown severity 'verbose'".to_string())
        );
    }

    #[test]
    fn test_mask_contains() {
        let mask = SeverityMask::NONE.with(Severity::Info).with(Severity::Error);
        assert!(mask.contains(Severity::Info));
        assert!(mask.contains(Severity::Error));
        assert!(!mask.contains(Severity::Warn));
        assert_eq!(mask.bits(), 0b01010);
        assert!(!mask.without(Severity::Info).contains(Severity::Info));
    }

    #[test]
    fn test_mask_at_least() {
        let mask = SeverityMask::at_least(Severity::Warn);
        assert_eq!(mask.bits(), 0b11100);
        assert_eq!(SeverityMask::at_least(Severity::Debug), SeverityMask::ALL);
        assert_eq!(SeverityMask::from_bits(0xff), SeverityMask::ALL);
    }

    #[test]
    fn test_split_message_trims_blank_edges() {
        assert_eq!(split_message("\n\nfirst\n\nsecond\n\n"), vec!["first", "", "second"]);
        assert_eq!(split_message("single"), vec!["single"]);
        assert!(split_message("\n\n").is_empty());
        assert!(split_message("").is_empty());
    }

    #[test]
    fn test_severity_counts() {
        let mut counts = SeverityCounts::default();
        counts.increment(Severity::Warn);
        counts.increment(Severity::Warn);
        counts.increment(Severity::Fatal);
        assert_eq!(counts.get(Severity::Warn), 2);
        assert_eq!(counts.get(Severity::Debug), 0);
        assert_eq!(counts.total(), 3);
    }
}
