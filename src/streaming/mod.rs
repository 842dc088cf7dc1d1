//! Streaming CSV decoding engine
//!
//! This module provides the synchronous core:
//! - Byte-level tokenizer that carries state across fragments
//! - Session that captures headers and materializes rows
//! - Record encoder producing input the tokenizer reads back unchanged

pub mod row;
pub mod session;
pub mod tokenizer;
pub mod writer;

pub use row::{column_keys, normalize_header, Row};
pub use session::CsvSession;
pub use tokenizer::{Record, Tokenizer};
pub use writer::write_record;
