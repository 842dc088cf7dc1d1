//! Pull-mode delivery
//!
//! The caller hands over a byte source and the loop drains it until
//! exhaustion. Acquiring the next fragment is the only point where the
//! async variant yields; the session itself never suspends.

use std::io::{ErrorKind, Read};

use futures::{pin_mut, Stream, StreamExt};
use log::debug;

use super::{CsvDecoder, RowSink, RunError, RunSummary};
use crate::error::CsvError;
use crate::telemetry::DeliveryMode;

impl CsvDecoder {
    /// Decode everything `reader` yields, reading `chunk_size` bytes at a time
    pub fn decode_reader<R, S>(&self, mut reader: R, sink: &mut S) -> Result<RunSummary, RunError>
    where
        R: Read,
        S: RowSink,
    {
        let mut run = self.start_run(DeliveryMode::Reader)?;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(run.failure(CsvError::Io(e))),
            };

            if let Err(e) = run.push(&buf[..n], sink) {
                return Err(run.failure(e));
            }
        }

        run.finish(sink).map_err(|e| run.failure(e))
    }

    /// Decode an async stream of byte buffers until it ends
    pub async fn decode_stream<St, B, E, S>(
        &self,
        stream: St,
        sink: &mut S,
    ) -> Result<RunSummary, RunError>
    where
        St: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        S: RowSink,
    {
        let mut run = self.start_run(DeliveryMode::Stream)?;
        pin_mut!(stream);

        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => return Err(run.failure(CsvError::Upstream(e.into()))),
            };

            match run.push(chunk.as_ref(), sink) {
                Ok(count) if count > 0 => {
                    debug!(
                        "Stream fragment of {} bytes produced {} rows",
                        chunk.as_ref().len(),
                        count
                    );
                }
                Ok(_) => {}
                Err(e) => return Err(run.failure(e)),
            }
        }

        run.finish(sink).map_err(|e| run.failure(e))
    }
}
