//! CSV decoding session
//!
//! Binds one `Tokenizer` to a fixed `CsvConfig` and turns records into rows.
//! A session belongs to exactly one logical input and one producer: feed
//! fragments in source order, then call `finish` once. Dropping a session
//! mid-record is always safe.

use log::{debug, warn};

use super::row::{column_keys, normalize_header, Row};
use super::tokenizer::{Record, Tokenizer};
use crate::config::{CsvConfig, FieldCountPolicy};
use crate::error::Result;

pub struct CsvSession {
    config: CsvConfig,
    tokenizer: Tokenizer,
    /// Captured header names (header mode only)
    headers: Option<Vec<String>>,
    /// Field count data rows must match under the strict policy
    expected_width: Option<usize>,
    rows_emitted: usize,
    rows_failed: usize,
}

impl CsvSession {
    /// Create a session; fails fast on invalid configuration
    pub fn new(config: CsvConfig) -> Result<Self> {
        config.validate()?;
        let tokenizer = Tokenizer::new(config.delimiter, config.quote);

        Ok(Self {
            config,
            tokenizer,
            headers: None,
            expected_width: None,
            rows_emitted: 0,
            rows_failed: 0,
        })
    }

    /// Feed one fragment; returns the rows completed by this fragment only
    pub fn push_chunk(&mut self, fragment: &[u8]) -> Result<Vec<Row>> {
        let records = self.tokenizer.feed(fragment)?;
        Ok(self.materialize(records))
    }

    /// Flush the trailing unterminated record, if any
    pub fn finish(&mut self) -> Result<Vec<Row>> {
        let records: Vec<Record> = self.tokenizer.finalize()?.into_iter().collect();
        let rows = self.materialize(records);

        debug!(
            "CSV session finished: {} records, {} rows emitted, {} failed, {} bytes",
            self.tokenizer.records_emitted(),
            self.rows_emitted,
            self.rows_failed,
            self.tokenizer.bytes_fed()
        );

        Ok(rows)
    }

    fn materialize(&mut self, records: Vec<Record>) -> Vec<Row> {
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            if self.config.has_headers && self.headers.is_none() {
                self.capture_headers(&record);
                continue;
            }

            if let Some(row) = self.classify(&record) {
                rows.push(row);
            }
        }

        self.rows_emitted += rows.len();
        rows
    }

    fn capture_headers(&mut self, record: &Record) {
        let names: Vec<String> = record
            .to_strings()
            .into_iter()
            .map(|name| {
                if self.config.normalize_headers {
                    normalize_header(&name)
                } else {
                    name
                }
            })
            .collect();

        let keys = column_keys(&names, names.len());
        if keys != names {
            debug!("Renamed colliding header columns: {:?}", keys);
        }

        debug!("Captured {} header columns", keys.len());
        self.expected_width = Some(keys.len());
        self.headers = Some(keys);
    }

    /// Materialize a data record, or `None` when it is skipped or rejected
    fn classify(&mut self, record: &Record) -> Option<Row> {
        let row = match &self.headers {
            Some(headers) => Row::named(headers, record),
            None => Row::positional(record),
        };

        if self.config.skip_blank_rows && row.is_blank() {
            return None;
        }

        if self.config.field_count_policy == FieldCountPolicy::Strict {
            let expected = *self.expected_width.get_or_insert(record.len());
            if record.len() != expected {
                self.rows_failed += 1;
                warn!(
                    "Rejected row with {} fields, expected {}",
                    record.len(),
                    expected
                );
                return None;
            }
        }

        Some(row)
    }

    /// Captured header names, once the first record has been seen
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Total rows surfaced so far
    pub fn rows_emitted(&self) -> usize {
        self.rows_emitted
    }

    /// Total rows rejected by the strict field-count policy
    pub fn rows_failed(&self) -> usize {
        self.rows_failed
    }

    pub fn is_finished(&self) -> bool {
        self.tokenizer.is_finished()
    }

    pub fn bytes_fed(&self) -> usize {
        self.tokenizer.bytes_fed()
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }
}
