//! Incremental CSV decoding engine with an Envoy ingest filter
//!
//! The engine turns arbitrary byte fragments into rows without ever
//! holding more than the current record. Fragments may arrive from a
//! pulled reader/stream or be pushed one by one; the output is identical
//! for any split of the same input.
//!
//! The cdylib build registers an HTTP filter that decodes CSV request
//! bodies chunk by chunk as Envoy delivers them.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
pub mod error;
pub mod ingest;
pub mod streaming;
pub mod telemetry;

pub use config::{CsvConfig, FieldCountPolicy, FilterConfig};
pub use error::{CsvError, Result};
pub use ingest::{
    Callbacks, ChunkIngestor, Clock, CsvDecoder, IngestDecision, RowSink, RunError, RunSummary,
};
pub use streaming::{write_record, CsvSession, Record, Row, Tokenizer};

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType, LogLevel};
use std::cell::RefCell;
use std::time::UNIX_EPOCH;

// Thread-local storage for filter configuration
thread_local! {
    static CONFIG: RefCell<FilterConfig> = RefCell::new(FilterConfig::default());
}

/// Root context for filter lifecycle management
struct CsvIngestRootContext {
    config: FilterConfig,
}

impl CsvIngestRootContext {
    fn new() -> Self {
        Self {
            config: FilterConfig::default(),
        }
    }
}

impl Context for CsvIngestRootContext {}

impl RootContext for CsvIngestRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            match FilterConfig::from_bytes(&config_bytes) {
                Ok(config) => self.config = config,
                Err(e) => {
                    warn!("Rejecting CSV filter configuration: {}", e);
                    return false;
                }
            }
        }

        // Store config in thread-local for HTTP contexts to access
        CONFIG.with(|c| {
            *c.borrow_mut() = self.config.clone();
        });

        info!(
            "CSV ingest filter initialized: delimiter={:?}, has_headers={}, reject_failed_rows={}",
            self.config.csv.delimiter as char,
            self.config.csv.has_headers,
            self.config.reject_failed_rows
        );

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(CsvIngestHttpContext::new(context_id)))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// Sink that drops rows and logs per-chunk progress
struct ProgressLog {
    context_id: u32,
    rows_seen: usize,
}

impl RowSink for ProgressLog {
    fn on_rows(&mut self, rows: Vec<Row>) {
        self.rows_seen += rows.len();
    }

    fn on_progress(&mut self, count: usize) {
        debug!("[context_id={}] Decoded {} rows", self.context_id, count);
    }
}

/// Envoy's clock in milliseconds since the Unix epoch
fn host_clock() -> u64 {
    proxy_wasm::hostcalls::get_current_time()
        .ok()
        .and_then(|now| now.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Part of Envoy's request body buffer still to decode, as `(start, len)`.
///
/// While paused Envoy keeps appending to one buffer, so only the tail past
/// `buffered` is new. Otherwise every callback carries a fresh chunk.
fn body_window(hold: bool, buffered: usize, body_size: usize) -> (usize, usize) {
    let start = if hold { buffered.min(body_size) } else { 0 };
    (start, body_size - start)
}

/// JSON body answered when an upload is rejected
fn rejection_body(summary: &RunSummary) -> String {
    serde_json::json!({
        "error": "CSV rows failed validation",
        "summary": summary,
        "status": 422
    })
    .to_string()
}

/// HTTP context for per-request processing
struct CsvIngestHttpContext {
    context_id: u32,
    /// Present only for requests with a CSV content type
    ingestor: Option<ChunkIngestor>,
    progress: ProgressLog,
    /// Body bytes already decoded out of Envoy's buffer while paused
    buffered: usize,
    /// Final counts once the body has been fully decoded
    summary: Option<RunSummary>,
    /// Track if we've already sent a reject response
    request_rejected: bool,
    /// Configuration snapshot for this request
    config: FilterConfig,
}

impl CsvIngestHttpContext {
    fn new(context_id: u32) -> Self {
        let config = CONFIG.with(|c| c.borrow().clone());

        Self {
            context_id,
            ingestor: None,
            progress: ProgressLog {
                context_id,
                rows_seen: 0,
            },
            buffered: 0,
            summary: None,
            request_rejected: false,
            config,
        }
    }

    /// Send a 422 response with the run summary as JSON body
    fn send_reject_response(&mut self, summary: &RunSummary) {
        if self.request_rejected {
            return;
        }

        self.request_rejected = true;
        telemetry::upload_rejected(summary)
            .with_input_id(&self.context_id.to_string())
            .emit();

        let body = rejection_body(summary);
        self.send_http_response(
            422,
            vec![
                ("content-type", "application/json"),
                ("x-csv-rejected", "true"),
            ],
            Some(body.as_bytes()),
        );
    }
}

impl Context for CsvIngestHttpContext {}

impl HttpContext for CsvIngestHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        let content_type = match self.get_http_request_header("content-type") {
            Some(ct) => ct,
            None => return Action::Continue,
        };

        if !self.config.accepts_content_type(&content_type) {
            debug!(
                "[context_id={}] Skipping non-CSV content-type: {}",
                self.context_id, content_type
            );
            return Action::Continue;
        }

        match ChunkIngestor::new(self.config.csv.clone()) {
            Ok(ingestor) => self.ingestor = Some(ingestor.with_clock(host_clock)),
            Err(e) => warn!("[context_id={}] Cannot decode body: {}", self.context_id, e),
        }

        Action::Continue
    }

    fn on_http_request_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        if self.request_rejected {
            return Action::Pause;
        }

        let hold = self.config.reject_failed_rows;
        let (start, len) = body_window(hold, self.buffered, body_size);
        let chunk = self.get_http_request_body(start, len).unwrap_or_default();

        let ingestor = match self.ingestor.as_mut() {
            Some(ingestor) => ingestor,
            None => return Action::Continue,
        };

        match ingestor.on_body_chunk(&chunk, end_of_stream, &mut self.progress) {
            IngestDecision::Continue => {
                if hold {
                    self.buffered = body_size;
                    return Action::Pause;
                }
                Action::Continue
            }
            IngestDecision::Complete(summary) => {
                info!(
                    "[context_id={}] Decoded {} rows ({} failed) from {} bytes",
                    self.context_id,
                    summary.processed_row_count,
                    summary.failed_row_count,
                    ingestor.total_bytes()
                );
                let reject = hold && summary.failed_row_count > 0;
                self.summary = Some(summary.clone());
                if reject {
                    self.send_reject_response(&summary);
                    return Action::Pause;
                }
                Action::Continue
            }
            IngestDecision::Failed(reason) => {
                // Fail open: decoding problems never block the upload
                warn!("[context_id={}] {}", self.context_id, reason);
                Action::Continue
            }
        }
    }

    fn on_http_response_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        if let Some(summary) = &self.summary {
            let rows = summary.processed_row_count.to_string();
            let failed = summary.failed_row_count.to_string();
            self.set_http_response_header("x-csv-rows", Some(&rows));
            self.set_http_response_header("x-csv-failed-rows", Some(&failed));
        }
        Action::Continue
    }

    fn on_log(&mut self) {
        if self.request_rejected {
            info!(
                "[context_id={}] CSV upload was REJECTED by ingest filter",
                self.context_id
            );
        } else if self.ingestor.is_some() {
            debug!(
                "[context_id={}] CSV request complete, {} rows seen",
                self.context_id, self.progress.rows_seen
            );
        }
    }
}

// Register the filter with proxy-wasm runtime
proxy_wasm::main! {{
    proxy_wasm::set_log_level(LogLevel::Info);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(CsvIngestRootContext::new())
    });
}}
