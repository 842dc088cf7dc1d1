//! Configuration module for the CSV decoding engine
//!
//! `CsvConfig` is fixed for the lifetime of a session. `FilterConfig` wraps
//! it with the Envoy filter knobs and is loaded from the plugin
//! configuration JSON, NOT from external files.

use serde::Deserialize;

use crate::error::{CsvError, Result};

/// How data rows whose field count disagrees with the expected width are handled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCountPolicy {
    /// Pad short rows with absent values, keep extras under positional keys
    #[default]
    Lenient,
    /// Drop mismatched rows and count them as failed
    Strict,
}

/// Decoding options for one logical CSV input
#[derive(Clone, Debug, Deserialize)]
pub struct CsvConfig {
    /// Field delimiter byte
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,

    /// Treat the first record as column names
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,

    /// Quote byte; quoting is only recognized at the start of a field
    #[serde(default = "default_quote")]
    pub quote: u8,

    #[serde(default)]
    pub field_count_policy: FieldCountPolicy,

    /// Trim, lowercase and replace non-alphanumerics in header names
    #[serde(default)]
    pub normalize_headers: bool,

    /// Drop rows whose fields are all whitespace
    #[serde(default)]
    pub skip_blank_rows: bool,
}

fn default_delimiter() -> u8 {
    b','
}

fn default_has_headers() -> bool {
    true
}

fn default_quote() -> u8 {
    b'"'
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_headers: default_has_headers(),
            quote: default_quote(),
            field_count_policy: FieldCountPolicy::default(),
            normalize_headers: false,
            skip_blank_rows: false,
        }
    }
}

impl CsvConfig {
    /// Shorthand for the two options most callers set
    pub fn new(delimiter: u8, has_headers: bool) -> Self {
        Self {
            delimiter,
            has_headers,
            ..Default::default()
        }
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_field_count_policy(mut self, policy: FieldCountPolicy) -> Self {
        self.field_count_policy = policy;
        self
    }

    pub fn with_normalized_headers(mut self, enabled: bool) -> Self {
        self.normalize_headers = enabled;
        self
    }

    pub fn with_skip_blank_rows(mut self, enabled: bool) -> Self {
        self.skip_blank_rows = enabled;
        self
    }

    /// Reject byte assignments the tokenizer cannot disambiguate
    pub fn validate(&self) -> Result<()> {
        if matches!(self.delimiter, b'\n' | b'\r') {
            return Err(CsvError::InvalidConfig(format!(
                "delimiter {:?} collides with the record terminator",
                self.delimiter as char
            )));
        }
        if matches!(self.quote, b'\n' | b'\r') {
            return Err(CsvError::InvalidConfig(format!(
                "quote {:?} collides with the record terminator",
                self.quote as char
            )));
        }
        if self.delimiter == self.quote {
            return Err(CsvError::InvalidConfig(format!(
                "delimiter and quote are both {:?}",
                self.delimiter as char
            )));
        }
        Ok(())
    }

    /// Parse configuration from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self = parse_json(bytes)?;
        config.validate()?;
        Ok(config)
    }
}

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct FilterConfig {
    #[serde(flatten)]
    pub csv: CsvConfig,

    /// Hold the body until end of stream and answer 422 when any row failed
    #[serde(default)]
    pub reject_failed_rows: bool,

    /// Content types routed through the decoder (matched by substring)
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,
}

fn default_content_types() -> Vec<String> {
    vec!["text/csv".to_string(), "application/csv".to_string()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            csv: CsvConfig::default(),
            reject_failed_rows: false,
            content_types: default_content_types(),
        }
    }
}

impl FilterConfig {
    /// Parse configuration from JSON bytes (from Envoy plugin configuration)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self = parse_json(bytes)?;
        config.csv.validate()?;
        Ok(config)
    }

    /// Check if a request content type should be decoded
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let ct_lower = content_type.to_lowercase();
        self.content_types
            .iter()
            .any(|ct| ct_lower.contains(&ct.to_lowercase()))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let config_str = std::str::from_utf8(bytes)
        .map_err(|e| CsvError::InvalidConfig(format!("invalid UTF-8: {}", e)))?;

    serde_json::from_str(config_str)
        .map_err(|e| CsvError::InvalidConfig(format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CsvConfig::default();
        assert_eq!(config.delimiter, b',');
        assert!(config.has_headers);
        assert_eq!(config.quote, b'"');
        assert_eq!(config.field_count_policy, FieldCountPolicy::Lenient);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_terminator_delimiter_rejected() {
        assert!(matches!(
            CsvConfig::new(b'\n', true).validate(),
            Err(CsvError::InvalidConfig(_))
        ));
        assert!(CsvConfig::new(b'\r', false).validate().is_err());
        assert!(CsvConfig::new(b'"', true).validate().is_err());
        assert!(CsvConfig::new(b'\t', true).validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{"delimiter": 59, "has_headers": false, "field_count_policy": "strict"}"#;
        let config = CsvConfig::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(config.delimiter, b';');
        assert!(!config.has_headers);
        assert_eq!(config.field_count_policy, FieldCountPolicy::Strict);
        assert_eq!(config.quote, b'"');
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(CsvConfig::from_bytes(b"{not json").is_err());
        assert!(CsvConfig::from_bytes(br#"{"delimiter": 10}"#).is_err());
    }

    #[test]
    fn test_filter_config_flattened() {
        let json = r#"{"delimiter": 124, "reject_failed_rows": true}"#;
        let config = FilterConfig::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(config.csv.delimiter, b'|');
        assert!(config.csv.has_headers);
        assert!(config.reject_failed_rows);
        assert!(config.accepts_content_type("Text/CSV; charset=utf-8"));
        assert!(!config.accepts_content_type("application/json"));
    }
}
