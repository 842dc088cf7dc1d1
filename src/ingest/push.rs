//! Push-mode delivery
//!
//! CRITICAL: This ingestor does NOT accumulate the body.
//! Chunks are decoded as they arrive and only the in-progress record is
//! retained between calls.

use log::debug;

use super::{Clock, CsvDecoder, Run, RowSink, RunSummary};
use crate::config::CsvConfig;
use crate::error::Result;
use crate::telemetry::DeliveryMode;

/// Push-mode collaborator wrapping one session
pub struct ChunkIngestor {
    run: Run,
    /// Total bytes seen
    total_bytes_seen: usize,
    /// Set by `end_of_stream` or a failure
    complete: bool,
}

impl ChunkIngestor {
    /// Create an ingestor; fails fast on invalid configuration
    pub fn new(config: CsvConfig) -> Result<Self> {
        Self::from_decoder(&CsvDecoder::new(config)?)
    }

    /// Create an ingestor with a fresh session from `decoder`
    pub fn from_decoder(decoder: &CsvDecoder) -> Result<Self> {
        Ok(Self {
            run: Run::new(decoder.session()?, DeliveryMode::Push),
            total_bytes_seen: 0,
            complete: false,
        })
    }

    /// Time the run with `clock` instead of the process clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.run.set_clock(clock);
        self
    }

    /// Process a body chunk.
    ///
    /// Call this for each chunk received, with `end_of_stream` set on the
    /// last one (which may be empty). Rows go to `sink` as they complete.
    pub fn on_body_chunk<S: RowSink>(
        &mut self,
        chunk: &[u8],
        end_of_stream: bool,
        sink: &mut S,
    ) -> IngestDecision {
        self.total_bytes_seen += chunk.len();

        let pushed = self.run.push(chunk, sink);
        let result = match pushed {
            Ok(count) if end_of_stream => {
                debug!("Final chunk produced {} rows", count);
                self.run.finish(sink)
            }
            Ok(count) => {
                if count > 0 {
                    debug!("Chunk of {} bytes produced {} rows", chunk.len(), count);
                }
                return IngestDecision::Continue;
            }
            Err(e) => Err(e),
        };

        self.complete = true;
        match result {
            Ok(summary) => IngestDecision::Complete(summary),
            Err(e) => IngestDecision::Failed(self.run.failure(e).to_string()),
        }
    }

    /// Check if ingestion is complete
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Get total bytes processed
    pub fn total_bytes(&self) -> usize {
        self.total_bytes_seen
    }

    /// Counts so far (final once complete)
    pub fn summary(&self) -> RunSummary {
        self.run.summary()
    }

    /// Header names captured so far
    pub fn headers(&self) -> Option<&[String]> {
        self.run.session().headers()
    }
}

/// Decision after ingesting a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestDecision {
    /// More chunks expected
    Continue,
    /// End of stream reached and flushed
    Complete(RunSummary),
    /// Sequencing violation; no further chunks are accepted
    Failed(String),
}

impl IngestDecision {
    /// Check if more chunks are expected
    pub fn should_continue(&self) -> bool {
        matches!(self, IngestDecision::Continue)
    }

    /// Get the summary if complete
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            IngestDecision::Complete(summary) => Some(summary),
            _ => None,
        }
    }

    /// Get the failure reason if failed
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            IngestDecision::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
