//! Byte-level CSV Tokenizer
//!
//! CRITICAL: Fragment boundaries are arbitrary. A delimiter, quote or CRLF
//! pair split across two `feed` calls must produce exactly what the
//! unsplit input produces. All cross-fragment state lives in this struct:
//! - the current FSM state
//! - the bytes of the in-progress record
//! - the end offsets of the fields completed so far
//!
//! Memory is bounded by the longest record, never by the total input.

use crate::error::{CsvError, Result};

/// Tokenizer FSM state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing consumed for the current record yet
    RecordStart,
    /// A delimiter was seen; the next field has not started
    FieldStart,
    InUnquotedField,
    InQuotedField,
    /// Quote seen inside a quoted field: escape, close, or stray
    QuoteSeen,
    /// Record ended on `\r`; a following `\n` belongs to the same terminator
    AfterCr,
}

/// One complete record: field bytes stored contiguously plus end offsets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
    ends: Vec<usize>,
}

impl Record {
    /// Build a record from individual fields
    pub fn from_fields<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut record = Record::default();
        for field in fields {
            record.bytes.extend_from_slice(field.as_ref());
            record.ends.push(record.bytes.len());
        }
        record
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Raw bytes of field `index`
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let end = *self.ends.get(index)?;
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Some(&self.bytes[start..end])
    }

    /// Iterate over raw field bytes in order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.ends.len()).filter_map(move |i| self.get(i))
    }

    /// Decode every field as text (invalid UTF-8 is replaced, never an error)
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect()
    }
}

/// Incremental CSV tokenizer
pub struct Tokenizer {
    delimiter: u8,
    quote: u8,
    state: State,
    /// Record being assembled (survives across `feed` calls)
    pending: Record,
    /// Set once `finalize` has run
    finished: bool,
    /// Total bytes fed
    bytes_fed: usize,
    /// Total records emitted
    records_emitted: usize,
}

impl Tokenizer {
    /// Create a tokenizer. Byte assignments are validated by `CsvConfig`.
    pub fn new(delimiter: u8, quote: u8) -> Self {
        Self {
            delimiter,
            quote,
            state: State::RecordStart,
            pending: Record::default(),
            finished: false,
            bytes_fed: 0,
            records_emitted: 0,
        }
    }

    /// Consume one fragment, returning the records it completed
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Vec<Record>> {
        if self.finished {
            return Err(CsvError::FeedAfterFinish);
        }

        let mut out = Vec::new();
        for &byte in fragment {
            self.step(byte, &mut out);
        }
        self.bytes_fed += fragment.len();

        Ok(out)
    }

    /// Flush any in-progress record. Must be called exactly once.
    pub fn finalize(&mut self) -> Result<Option<Record>> {
        if self.finished {
            return Err(CsvError::AlreadyFinished);
        }
        self.finished = true;

        match self.state {
            State::RecordStart | State::AfterCr => Ok(None),
            // Trailing delimiter, unterminated field, or unterminated quote
            State::FieldStart
            | State::InUnquotedField
            | State::InQuotedField
            | State::QuoteSeen => {
                self.end_field();
                Ok(Some(self.take_record()))
            }
        }
    }

    /// Advance FSM by one byte - O(1) amortized
    fn step(&mut self, byte: u8, out: &mut Vec<Record>) {
        match self.state {
            State::AfterCr if byte == b'\n' => {
                self.state = State::RecordStart;
            }
            State::RecordStart | State::AfterCr => {
                if byte == b'\n' || byte == b'\r' {
                    // Blank line: no record
                    self.state = if byte == b'\r' {
                        State::AfterCr
                    } else {
                        State::RecordStart
                    };
                } else {
                    self.start_field(byte);
                }
            }
            State::FieldStart => {
                if byte == b'\n' || byte == b'\r' {
                    // Trailing delimiter leaves one empty field
                    self.end_field();
                    self.end_record(byte, out);
                } else {
                    self.start_field(byte);
                }
            }
            State::InUnquotedField => self.boundary_or(byte, out, State::InUnquotedField),
            State::InQuotedField => {
                if byte == self.quote {
                    self.state = State::QuoteSeen;
                } else {
                    self.pending.bytes.push(byte);
                }
            }
            State::QuoteSeen => {
                if byte == self.quote {
                    // Escaped literal quote
                    self.pending.bytes.push(byte);
                    self.state = State::InQuotedField;
                } else {
                    // Anything after a closing quote other than a boundary is
                    // kept as content and the field continues unquoted
                    self.boundary_or(byte, out, State::InUnquotedField);
                }
            }
        }
    }

    /// First byte of a field: quote opens quoted mode, anything else is content
    fn start_field(&mut self, byte: u8) {
        if byte == self.quote {
            self.state = State::InQuotedField;
        } else if byte == self.delimiter {
            self.end_field();
            self.state = State::FieldStart;
        } else {
            self.pending.bytes.push(byte);
            self.state = State::InUnquotedField;
        }
    }

    /// Handle delimiter/terminator, otherwise append content and move to `next`
    fn boundary_or(&mut self, byte: u8, out: &mut Vec<Record>, next: State) {
        if byte == self.delimiter {
            self.end_field();
            self.state = State::FieldStart;
        } else if byte == b'\n' || byte == b'\r' {
            self.end_field();
            self.end_record(byte, out);
        } else {
            self.pending.bytes.push(byte);
            self.state = next;
        }
    }

    fn end_field(&mut self) {
        self.pending.ends.push(self.pending.bytes.len());
    }

    fn end_record(&mut self, terminator: u8, out: &mut Vec<Record>) {
        out.push(self.take_record());
        self.state = if terminator == b'\r' {
            State::AfterCr
        } else {
            State::RecordStart
        };
    }

    fn take_record(&mut self) -> Record {
        self.records_emitted += 1;
        let capacity = self.pending.bytes.len();
        let fields = self.pending.ends.len();
        std::mem::replace(
            &mut self.pending,
            Record {
                bytes: Vec::with_capacity(capacity),
                ends: Vec::with_capacity(fields),
            },
        )
    }

    /// Check if `finalize` has been called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Get total bytes fed
    pub fn bytes_fed(&self) -> usize {
        self.bytes_fed
    }

    /// Get total records emitted
    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }
}
