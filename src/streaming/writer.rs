//! CSV record encoder
//!
//! Produces bytes the tokenizer reads back unchanged. Fields are quoted only
//! when needed: when they contain the delimiter, the quote byte, `\r` or
//! `\n`, or when the record is a single empty field (a bare empty line is a
//! blank line, not a record).

use csv_core::{Terminator, WriteResult, Writer, WriterBuilder};

use crate::config::CsvConfig;

/// Scratch size for one encoder step; larger fields take several steps
const SCRATCH_SIZE: usize = 1024;

/// Append one encoded record, terminated by `\n`
pub fn write_record<I, F>(fields: I, config: &CsvConfig, out: &mut Vec<u8>)
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = record_writer(config);
    let mut scratch = [0u8; SCRATCH_SIZE];

    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            drain(&mut scratch, out, |buf| writer.delimiter(buf));
        }

        let mut input = field.as_ref();
        loop {
            let (result, nin, nout) = writer.field(input, &mut scratch);
            out.extend_from_slice(&scratch[..nout]);
            input = &input[nin..];
            if result == WriteResult::InputEmpty {
                break;
            }
        }
    }

    drain(&mut scratch, out, |buf| writer.terminator(buf));
}

fn record_writer(config: &CsvConfig) -> Writer {
    WriterBuilder::new()
        .delimiter(config.delimiter)
        .quote(config.quote)
        .terminator(Terminator::Any(b'\n'))
        .build()
}

/// Run an encoder step until it has written everything it holds
fn drain<F>(scratch: &mut [u8], out: &mut Vec<u8>, mut step: F)
where
    F: FnMut(&mut [u8]) -> (WriteResult, usize),
{
    loop {
        let (result, nout) = step(scratch);
        out.extend_from_slice(&scratch[..nout]);
        if result == WriteResult::InputEmpty {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[&str], config: &CsvConfig) -> String {
        let mut out = Vec::new();
        write_record(fields.iter().copied(), config, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_fields() {
        assert_eq!(encode(&["a", "b"], &CsvConfig::default()), "a,b\n");
    }

    #[test]
    fn test_quoting() {
        let config = CsvConfig::default();
        assert_eq!(encode(&["Doe, J", "x"], &config), "\"Doe, J\",x\n");
        assert_eq!(encode(&["say \"hi\""], &config), "\"say \"\"hi\"\"\"\n");
        assert_eq!(encode(&["l1\nl2", ""], &config), "\"l1\nl2\",\n");
        assert_eq!(encode(&["cr\ronly"], &config), "\"cr\ronly\"\n");
    }

    #[test]
    fn test_lone_empty_field_quoted() {
        assert_eq!(encode(&[""], &CsvConfig::default()), "\"\"\n");
        assert_eq!(encode(&["", ""], &CsvConfig::default()), ",\n");
    }

    #[test]
    fn test_custom_delimiter() {
        let config = CsvConfig::new(b';', false);
        assert_eq!(encode(&["a,b", "c;d"], &config), "a,b;\"c;d\"\n");
    }

    #[test]
    fn test_custom_quote() {
        let config = CsvConfig::default().with_quote(b'\'');
        assert_eq!(encode(&["it's", "b"], &config), "'it''s',b\n");
    }

    #[test]
    fn test_field_larger_than_scratch() {
        let long = "x,".repeat(SCRATCH_SIZE);
        let encoded = encode(&[&long, "tail"], &CsvConfig::default());
        assert_eq!(encoded, format!("\"{}\",tail\n", long));
    }
}
