//! Kundt's tube acoustic experiment readings.

use super::{LineParser, float_field, insert_float, sentence_id};
use crate::error::ParseError;
use crate::line::{OutputLine, Record};
use serde_json::Value;

const KDT: &str = "KDT";

/// Parses `$KDT,<frequency>,<node_1>,...,<node_n>`: the driving frequency in
/// hertz followed by the positions, in metres, of the standing wave nodes.
#[derive(Debug, Clone)]
pub struct KundtParser {
    url: String,
}

impl KundtParser {
    pub fn new() -> Self {
        Self {
            url: "kundt".to_string(),
        }
    }
}

impl Default for KundtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for KundtParser {
    fn name(&self) -> &'static str {
        "KundtParser"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn can_parse(&self, line: &str) -> Option<&'static str> {
        (sentence_id(line)? == KDT).then_some(KDT)
    }

    fn parse(&self, line: &OutputLine) -> Result<Record, ParseError> {
        let fields = line.fields();
        let frequency = float_field(&fields, 0, "frequency")?;
        if frequency <= 0.0 {
            return Err(ParseError::validation("frequency must be positive"));
        }

        let nodes = (1..fields.len())
            .map(|index| float_field(&fields, index, "node"))
            .collect::<Result<Vec<_>, _>>()?;
        if nodes.len() < 2 {
            return Err(ParseError::validation(format!(
                "at least 2 node positions required, got {}",
                nodes.len()
            )));
        }
        if nodes.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(ParseError::validation(
                "node positions must be strictly increasing",
            ));
        }

        let mut record = Record::new();
        insert_float(&mut record, "frequency", frequency);
        record.insert(
            "nodes".to_string(),
            Value::Array(nodes.into_iter().map(Value::from).collect()),
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parse(raw: &str) -> Result<Record, ParseError> {
        let parser = KundtParser::new();
        let id = parser.can_parse(raw).expect("line should be claimed");
        parser.parse(&OutputLine::new(id, Utc::now(), raw))
    }

    #[test]
    fn test_can_parse() {
        let parser = KundtParser::new();
        assert_eq!(parser.can_parse("$KDT,440,0.1,0.49"), Some("KDT"));
        assert_eq!(parser.can_parse("$KDTX,440,0.1"), None);
        assert_eq!(parser.can_parse("$TLM,1,2,3,4,5,6"), None);
    }

    #[test]
    fn test_parse_nodes() {
        let record = parse("$KDT,440,0.10,0.49,0.88").unwrap();
        assert_eq!(record["frequency"], 440.0);
        assert_eq!(record["nodes"], serde_json::json!([0.10, 0.49, 0.88]));
    }

    #[test]
    fn test_rejects_too_few_nodes() {
        let error = parse("$KDT,440,0.10").unwrap_err();
        assert!(error.message.contains("got 1"));
    }

    #[test]
    fn test_rejects_unordered_nodes() {
        assert!(parse("$KDT,440,0.49,0.10").is_err());
        assert!(parse("$KDT,440,0.10,0.10").is_err());
    }

    #[test]
    fn test_rejects_bad_frequency() {
        assert!(parse("$KDT,0,0.1,0.5").is_err());
        assert!(parse("$KDT,loud,0.1,0.5").is_err());
    }
}
