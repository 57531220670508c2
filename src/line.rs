//! The unit of work flowing from the dispatcher to the parsers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Structured fields extracted from a line. An empty record means there is
/// nothing to send.
pub type Record = Map<String, Value>;

/// A raw line claimed by a parser, stamped with its capture time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputLine {
    message_id: String,
    timestamp: DateTime<Utc>,
    raw_text: String,
}

impl OutputLine {
    /// `message_id` is the sentence id without its `$`, e.g. `GPGGA`.
    pub fn new(
        message_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp,
            raw_text: raw_text.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Comma separated fields after the `$ID,` prefix. Any `*hh` checksum
    /// suffix is dropped.
    pub fn fields(&self) -> Vec<&str> {
        let body = self.raw_text.split('*').next().unwrap_or_default();
        body.split(',').skip(1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_skip_message_id() {
        let line = OutputLine::new("TLM", Utc::now(), "$TLM,21.5,101325,0,0,9.8,3.7");
        assert_eq!(line.fields(), vec!["21.5", "101325", "0", "0", "9.8", "3.7"]);
    }

    #[test]
    fn test_fields_drop_checksum() {
        let line = OutputLine::new("GPRMC", Utc::now(), "$GPRMC,123519,A*6A");
        assert_eq!(line.fields(), vec!["123519", "A"]);
    }

    #[test]
    fn test_fields_keep_empty_values() {
        let line = OutputLine::new("GPGGA", Utc::now(), "$GPGGA,,,");
        assert_eq!(line.fields(), vec!["", "", ""]);
    }
}
