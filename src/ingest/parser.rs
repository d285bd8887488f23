use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;

use logscope_store::{NewRecord, Severity};

/// Process name used when a line does not name its producer
pub const UNKNOWN_PROCESS: &str = "unknown";

/// Input line formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// `[LEVEL] [process] message` lines with optional timestamp and location
    Text,
}

/// A parsed record that owns its fields until it is appended
#[derive(Clone, Debug, PartialEq)]
pub struct IngestRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub process: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub message: String,
    pub seq: Option<u64>,
}

impl IngestRecord {
    /// Borrow as a store append request
    pub fn as_new_record(&self) -> NewRecord<'_> {
        NewRecord {
            timestamp: self.timestamp,
            severity: self.severity,
            process: &self.process,
            file: &self.file,
            function: &self.function,
            line: self.line,
            message: &self.message,
            seq: self.seq,
        }
    }
}

/// Severity as written by producers: a name or a bit-valued level
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Name(String),
    Bit(u8),
}

/// Timestamp as written by producers: RFC 3339 or fractional epoch seconds
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStamp {
    Rfc3339(DateTime<Utc>),
    Seconds(f64),
}

/// JSON line layout; field names follow the usual rosout conventions
#[derive(Deserialize)]
struct RawRecord {
    #[serde(alias = "timestamp", alias = "time")]
    stamp: Option<RawStamp>,
    #[serde(alias = "severity")]
    level: RawLevel,
    #[serde(alias = "node", alias = "process")]
    name: Option<String>,
    #[serde(default)]
    file: String,
    #[serde(default)]
    function: String,
    #[serde(default)]
    line: u32,
    #[serde(alias = "message", alias = "text")]
    msg: String,
    seq: Option<u64>,
}

static TEXT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?P<level>[A-Za-z]+)\]\s*(?:\[(?P<process>[^\]]+)\]\s*)?(?:\((?P<file>[^:()]+):(?P<line>\d+)(?:\s+(?P<function>[^()]+))?\)\s*)?(?P<msg>.*)$",
    )
    .expect("text line pattern is valid")
});

/// Log parser for turning input lines into records
pub struct LogParser;

impl LogParser {
    /// Parse a line in the given format; `now` stamps records without a timestamp
    pub fn parse(line: &str, format: InputFormat, now: DateTime<Utc>) -> Result<IngestRecord, String> {
        match format {
            InputFormat::Json => Self::parse_json(line, now),
            InputFormat::Text => Self::parse_text(line, now),
        }
    }

    fn parse_json(line: &str, now: DateTime<Utc>) -> Result<IngestRecord, String> {
        let raw: RawRecord = serde_json::from_str(line.trim()).map_err(|e| e.to_string())?;

        let severity = match raw.level {
            RawLevel::Name(name) => Severity::parse(&name),
            RawLevel::Bit(bit) => Severity::from_level_bit(bit),
        }
        .ok_or_else(|| "unrecognized severity".to_string())?;

        let timestamp = match raw.stamp {
            Some(RawStamp::Rfc3339(ts)) => ts,
            Some(RawStamp::Seconds(secs)) => from_epoch_seconds(secs)?,
            None => now,
        };

        Ok(IngestRecord {
            timestamp,
            severity,
            process: raw.name.unwrap_or_else(|| UNKNOWN_PROCESS.to_string()),
            file: raw.file,
            function: raw.function,
            line: raw.line,
            message: raw.msg,
            seq: raw.seq,
        })
    }

    fn parse_text(line: &str, now: DateTime<Utc>) -> Result<IngestRecord, String> {
        let (timestamp, content) = Self::extract_timestamp(line);

        let caps = TEXT_LINE
            .captures(content)
            .ok_or_else(|| "expected '[LEVEL] message'".to_string())?;

        let level = &caps["level"];
        let severity =
            Severity::parse(level).ok_or_else(|| format!("unrecognized severity '{}'", level))?;

        let line_number = match caps.name("line") {
            Some(m) => m.as_str().parse().map_err(|_| "line number out of range".to_string())?,
            None => 0,
        };

        let field = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };
        let process = caps
            .name("process")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_PROCESS.to_string());

        Ok(IngestRecord {
            timestamp: timestamp.unwrap_or(now),
            severity,
            process,
            file: field("file"),
            function: field("function"),
            line: line_number,
            message: unescape_newlines(&caps["msg"]),
            seq: None,
        })
    }

    /// Split a leading RFC 3339 timestamp off a line
    fn extract_timestamp(raw: &str) -> (Option<DateTime<Utc>>, &str) {
        if let Some((head, rest)) = raw.split_once(char::is_whitespace)
            && let Ok(ts) = DateTime::parse_from_rfc3339(head)
        {
            return (Some(ts.with_timezone(&Utc)), rest.trim_start());
        }
        (None, raw)
    }
}

fn from_epoch_seconds(secs: f64) -> Result<DateTime<Utc>, String> {
    if !secs.is_finite() {
        return Err("timestamp is not a finite number".to_string());
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(|| format!("timestamp {} out of range", secs))
}

/// Text lines carry embedded newlines as a literal `\n`
fn unescape_newlines(msg: &str) -> String {
    msg.replace("\\n", "\n")
}
