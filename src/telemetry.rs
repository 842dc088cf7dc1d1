//! Telemetry Module for CSV decoding runs
//!
//! Emits one structured JSON log line per finished, failed or rejected run.
//! In Wasm these lines are collected by Envoy's logging; natively they go
//! to whatever `log` backend the host installed.

use log::{info, warn};
use serde::Serialize;

use crate::ingest::RunSummary;

/// Decode event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeEventType {
    /// Input fully decoded
    RunCompleted,
    /// Input aborted by an upstream or sequencing error
    RunFailed,
    /// Upload refused because rows failed validation
    UploadRejected,
}

/// Delivery mode that fed the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Blocking `std::io::Read`
    Reader,
    /// Async byte stream
    Stream,
    /// Discrete pushed chunks
    Push,
}

/// Decode event for logging
#[derive(Debug, Clone, Serialize)]
pub struct DecodeEvent {
    pub event_type: DecodeEventType,
    pub mode: DeliveryMode,
    /// Request or input identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DecodeEvent {
    pub fn new(event_type: DecodeEventType, mode: DeliveryMode) -> Self {
        Self {
            event_type,
            mode,
            input_id: None,
            summary: None,
            bytes: None,
            reason: None,
        }
    }

    pub fn with_input_id(mut self, id: &str) -> Self {
        self.input_id = Some(id.to_string());
        self
    }

    pub fn with_summary(mut self, summary: &RunSummary) -> Self {
        self.summary = Some(summary.clone());
        self
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                DecodeEventType::RunFailed | DecodeEventType::UploadRejected => {
                    warn!("[CSV-STREAM] {}", json);
                }
                DecodeEventType::RunCompleted => {
                    info!("[CSV-STREAM] {}", json);
                }
            },
            Err(e) => {
                warn!("Failed to serialize decode event: {}", e);
            }
        }
    }
}

/// Create a completed run event
pub fn run_completed(mode: DeliveryMode, summary: &RunSummary) -> DecodeEvent {
    DecodeEvent::new(DecodeEventType::RunCompleted, mode).with_summary(summary)
}

/// Create a failed run event; `summary` holds the rows produced before the failure
pub fn run_failed(mode: DeliveryMode, summary: &RunSummary, reason: &str) -> DecodeEvent {
    DecodeEvent::new(DecodeEventType::RunFailed, mode)
        .with_summary(summary)
        .with_reason(reason)
}

/// Create an upload rejected event
pub fn upload_rejected(summary: &RunSummary) -> DecodeEvent {
    DecodeEvent::new(DecodeEventType::UploadRejected, DeliveryMode::Push)
        .with_summary(summary)
        .with_reason(&format!(
            "{} rows failed field count validation",
            summary.failed_row_count
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            processed_row_count: 10,
            failed_row_count: 2,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_decode_event_serialization() {
        let event = run_completed(DeliveryMode::Stream, &summary()).with_input_id("req-7");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("run_completed"));
        assert!(json.contains("\"mode\":\"stream\""));
        assert!(json.contains("\"processedRowCount\":10"));
        assert!(json.contains("req-7"));
        assert!(!json.contains("reason"));
    }

    #[test]
    fn test_upload_rejected() {
        let event = upload_rejected(&summary());
        assert_eq!(event.mode, DeliveryMode::Push);
        assert!(event.reason.as_ref().unwrap().contains("2 rows"));
    }

    #[test]
    fn test_run_failed_keeps_partial_summary() {
        let event = run_failed(DeliveryMode::Reader, &summary(), "broken pipe").with_bytes(42);
        assert_eq!(event.summary.as_ref().unwrap().processed_row_count, 10);
        assert_eq!(event.bytes, Some(42));
    }
}
