use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::parser::{InputFormat, IngestRecord, LogParser};
use crate::app::Action;

/// Items delivered from the input to the console loop
#[derive(Debug)]
pub enum Incoming {
    Record(IngestRecord),
    Command(Action),
}

/// Where records are read from
#[derive(Clone, Debug)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

/// Reads input lines on a background task and forwards parsed items
pub struct InputStream {
    /// Cancellation token for stopping the reader
    cancel: CancellationToken,

    /// Reader task handle
    task: Option<tokio::task::JoinHandle<()>>,
}

impl InputStream {
    /// Open `source` and start forwarding its lines to `tx`
    pub async fn start(
        source: InputSource,
        format: InputFormat,
        tx: mpsc::UnboundedSender<Incoming>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let task = match source {
            InputSource::Stdin => {
                let reader = BufReader::new(tokio::io::stdin());
                tokio::spawn(forward_lines(reader, format, tx, cancel.clone()))
            }
            InputSource::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("failed to open input {}", path.display()))?;
                tokio::spawn(forward_lines(BufReader::new(file), format, tx, cancel.clone()))
            }
        };

        Ok(Self {
            cancel,
            task: Some(task),
        })
    }

    /// Stop reading
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward every line of `reader` until EOF, cancellation, or a closed channel
pub async fn forward_lines<R>(
    reader: R,
    format: InputFormat,
    tx: mpsc::UnboundedSender<Incoming>,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            result = lines.next_line() => {
                let line = match result {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "input read failed");
                        break;
                    }
                };
                line_number += 1;

                if line.trim().is_empty() {
                    continue;
                }

                let item = match Action::parse_directive(&line) {
                    Some(Ok(action)) => Incoming::Command(action),
                    Some(Err(e)) => {
                        tracing::warn!(line = line_number, error = %e, "ignoring directive");
                        continue;
                    }
                    None => match LogParser::parse(&line, format, Utc::now()) {
                        Ok(record) => Incoming::Record(record),
                        Err(e) => {
                            tracing::warn!(line = line_number, error = %e, "skipping unparsable line");
                            continue;
                        }
                    },
                };

                if tx.send(item).is_err() {
                    // Console loop is gone
                    break;
                }
            }
        }
    }
    tracing::debug!(lines = line_number, "input finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_lines_mixes_records_and_commands() {
        let input = b"[INFO] [a] one\n\nnot a record\n:processes a\n[WARN] [b] two\n:bogus\n";
        let (tx, mut rx) = mpsc::unbounded_channel();

        forward_lines(&input[..], InputFormat::Text, tx, CancellationToken::new()).await;

        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], Incoming::Record(r) if r.process == "a"));
        assert!(matches!(
            &items[1],
            Incoming::Command(Action::SetProcessFilter(names)) if names == &vec!["a".to_string()]
        ));
        assert!(matches!(&items[2], Incoming::Record(r) if r.message == "two"));
    }

    #[tokio::test]
    async fn test_forward_lines_stops_when_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        forward_lines(&b"[INFO] x\n"[..], InputFormat::Text, tx, cancel).await;
        assert!(rx.try_recv().is_err());
    }
}
