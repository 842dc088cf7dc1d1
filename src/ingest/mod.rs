//! Ingest adapters: the collaborators that feed bytes into a session
//!
//! This module provides:
//! - `CsvDecoder`, a stateless factory minting one session per input
//! - Pull loops over `std::io::Read` and async byte streams
//! - A push adapter for discretely delivered chunks
//! - Run summaries and failures that keep partial progress

pub mod pull;
pub mod push;

pub use push::{ChunkIngestor, IngestDecision};

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

use crate::config::CsvConfig;
use crate::error::{CsvError, Result};
use crate::streaming::{CsvSession, Row};
use crate::telemetry::{self, DeliveryMode};

/// Default read size for the blocking pull loop
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Consumer of decoded rows and per-fragment progress counts
pub trait RowSink {
    /// Rows produced by one fragment, in source order
    fn on_rows(&mut self, rows: Vec<Row>);

    /// Number of rows produced by one fragment (never cumulative)
    fn on_progress(&mut self, _count: usize) {}
}

impl RowSink for Vec<Row> {
    fn on_rows(&mut self, rows: Vec<Row>) {
        self.extend(rows);
    }
}

/// Sink built from two closures
pub struct Callbacks<R, P> {
    on_rows: R,
    on_progress: P,
}

impl<R, P> Callbacks<R, P>
where
    R: FnMut(Vec<Row>),
    P: FnMut(usize),
{
    pub fn new(on_rows: R, on_progress: P) -> Self {
        Self {
            on_rows,
            on_progress,
        }
    }
}

impl<R, P> RowSink for Callbacks<R, P>
where
    R: FnMut(Vec<Row>),
    P: FnMut(usize),
{
    fn on_rows(&mut self, rows: Vec<Row>) {
        (self.on_rows)(rows);
    }

    fn on_progress(&mut self, count: usize) {
        (self.on_progress)(count);
    }
}

/// Outcome of one full run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed_row_count: usize,
    /// Rows rejected by the strict field-count policy
    pub failed_row_count: usize,
    pub duration_ms: u64,
}

/// A run that stopped early. `summary` counts the rows already delivered.
#[derive(Error, Debug)]
#[error("CSV run failed after {} rows: {source}", .summary.processed_row_count)]
pub struct RunError {
    pub summary: RunSummary,
    #[source]
    pub source: CsvError,
}

impl RunError {
    pub fn new(summary: RunSummary, source: CsvError) -> Self {
        Self { summary, source }
    }
}

/// Wall-clock source in milliseconds, used for `duration_ms`.
///
/// Inside the proxy-wasm filter this must be Envoy's host clock.
pub type Clock = fn() -> u64;

/// Milliseconds since the Unix epoch from the process clock
pub fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Stateless decoder factory holding a validated configuration
#[derive(Clone, Debug)]
pub struct CsvDecoder {
    config: CsvConfig,
    chunk_size: usize,
}

impl CsvDecoder {
    /// Validate `config` once; every session minted later shares it
    pub fn new(config: CsvConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Read size used by `decode_reader`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Fresh, independent session for one logical input
    pub fn session(&self) -> Result<CsvSession> {
        CsvSession::new(self.config.clone())
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    pub(crate) fn start_run(&self, mode: DeliveryMode) -> std::result::Result<Run, RunError> {
        self.session()
            .map(|session| Run::new(session, mode))
            .map_err(|e| RunError::new(RunSummary::default(), e))
    }
}

/// Bookkeeping shared by every delivery mode
pub(crate) struct Run {
    session: CsvSession,
    mode: DeliveryMode,
    clock: Clock,
    started_ms: u64,
}

impl Run {
    pub(crate) fn new(session: CsvSession, mode: DeliveryMode) -> Self {
        Self {
            session,
            mode,
            clock: system_clock,
            started_ms: system_clock(),
        }
    }

    /// Restart timing against another clock
    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
        self.started_ms = clock();
    }

    /// Feed one fragment and forward its rows
    pub(crate) fn push<S: RowSink>(&mut self, fragment: &[u8], sink: &mut S) -> Result<usize> {
        let rows = self.session.push_chunk(fragment)?;
        Ok(deliver(rows, sink))
    }

    /// Flush the session and report the final summary
    pub(crate) fn finish<S: RowSink>(&mut self, sink: &mut S) -> Result<RunSummary> {
        let rows = self.session.finish()?;
        deliver(rows, sink);

        let summary = self.summary();
        telemetry::run_completed(self.mode, &summary)
            .with_bytes(self.session.bytes_fed())
            .emit();
        Ok(summary)
    }

    /// Wrap `source` with the progress made so far
    pub(crate) fn failure(&self, source: CsvError) -> RunError {
        let summary = self.summary();
        telemetry::run_failed(self.mode, &summary, &source.to_string())
            .with_bytes(self.session.bytes_fed())
            .emit();
        RunError::new(summary, source)
    }

    pub(crate) fn summary(&self) -> RunSummary {
        RunSummary {
            processed_row_count: self.session.rows_emitted(),
            failed_row_count: self.session.rows_failed(),
            duration_ms: (self.clock)().saturating_sub(self.started_ms),
        }
    }

    pub(crate) fn session(&self) -> &CsvSession {
        &self.session
    }
}

fn deliver<S: RowSink>(rows: Vec<Row>, sink: &mut S) -> usize {
    let count = rows.len();
    if count > 0 {
        sink.on_rows(rows);
        sink.on_progress(count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_rejects_invalid_config() {
        assert!(matches!(
            CsvDecoder::new(CsvConfig::new(b'\r', true)),
            Err(CsvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sessions_are_independent() {
        let decoder = CsvDecoder::new(CsvConfig::default()).unwrap();
        let mut first = decoder.session().unwrap();
        let mut second = decoder.session().unwrap();

        first.push_chunk(b"a,b\n1,2\n").unwrap();
        assert!(first.headers().is_some());
        assert!(second.headers().is_none());

        let rows = second.push_chunk(b"x\n9\n").unwrap();
        assert_eq!(rows[0].get("x"), Some("9"));
    }

    #[test]
    fn test_run_summary_serialization() {
        let summary = RunSummary {
            processed_row_count: 3,
            failed_row_count: 1,
            duration_ms: 12,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(
            json,
            r#"{"processedRowCount":3,"failedRowCount":1,"durationMs":12}"#
        );
    }

    #[test]
    fn test_callbacks_sink() {
        let mut seen = Vec::new();
        let mut counts = Vec::new();
        {
            let mut sink = Callbacks::new(|rows: Vec<Row>| seen.extend(rows), |n| counts.push(n));
            deliver(vec![Row::Fields(vec!["a".into()])], &mut sink);
            deliver(Vec::new(), &mut sink);
        }
        assert_eq!(seen.len(), 1);
        assert_eq!(counts, vec![1]);
    }

    #[test]
    fn test_run_error_message() {
        let err = RunError::new(
            RunSummary {
                processed_row_count: 4,
                ..Default::default()
            },
            CsvError::FeedAfterFinish,
        );
        assert!(err.to_string().contains("after 4 rows"));
    }
}
