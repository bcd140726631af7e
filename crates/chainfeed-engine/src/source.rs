//! `LedgerSource` trait: abstraction over upstream raw event feeds.
//!
//! The engine runs one loop per source and calls `subscribe()` again
//! whenever the stream ends or fails with a retryable error.

use async_trait::async_trait;
use chainfeed_core::{RawLedgerEvent, SourceError};
use futures::{stream, Stream};
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// A stream of raw events from a single upstream.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawLedgerEvent, SourceError>> + Send>>;

#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Connect and start streaming raw events.
    async fn subscribe(&self) -> Result<RawEventStream, SourceError>;

    /// A finite recording: the engine stops when the stream ends instead
    /// of reconnecting.
    fn is_replay(&self) -> bool {
        false
    }
}

/// Replays raw events from a file holding one JSON object per line.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    name: String,
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("jsonl:{}", path.display()),
            path,
        }
    }
}

/// Parse one line; `None` for lines that carry no event.
pub fn parse_line(line_no: usize, line: &str) -> Option<Result<RawLedgerEvent, SourceError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(
        serde_json::from_str(trimmed).map_err(|e| SourceError::Decode {
            line: line_no,
            reason: e.to_string(),
        }),
    )
}

#[async_trait]
impl LedgerSource for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<RawEventStream, SourceError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| SourceError::ConnectionFailed {
                source_name: self.name.clone(),
                reason: e.to_string(),
            })?;
        info!(source = %self.name, "replaying events from file");
        let lines = BufReader::new(file).lines();

        let stream = stream::unfold((lines, 0usize), |(mut lines, mut line_no)| async move {
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(item) = parse_line(line_no, &line) {
                            return Some((item, (lines, line_no)));
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(SourceError::Io(e)), (lines, line_no))),
                }
            }
        });
        Ok(Box::pin(stream))
    }

    fn is_replay(&self) -> bool {
        true
    }
}
