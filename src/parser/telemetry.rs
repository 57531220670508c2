//! Housekeeping telemetry from the probe's onboard computer.

use super::{LineParser, float_field, insert_float, int_field, sentence_id};
use crate::error::ParseError;
use crate::line::{OutputLine, Record};

const TLM: &str = "TLM";
const ACK: &str = "ACK";

const PRESSURE: usize = 1;
const TLM_FIELDS: [&str; 6] = [
    "temperature",
    "pressure",
    "accel_x",
    "accel_y",
    "accel_z",
    "battery",
];

/// Parses `$TLM` sensor frames. `$ACK` acknowledgements are recognized but
/// carry nothing to report.
#[derive(Debug, Clone)]
pub struct TelemetryParser {
    url: String,
}

impl TelemetryParser {
    pub fn new() -> Self {
        Self {
            url: "telemetry".to_string(),
        }
    }
}

impl Default for TelemetryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for TelemetryParser {
    fn name(&self) -> &'static str {
        "TelemetryParser"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn can_parse(&self, line: &str) -> Option<&'static str> {
        match sentence_id(line)? {
            TLM => Some(TLM),
            ACK => Some(ACK),
            _ => None,
        }
    }

    fn parse(&self, line: &OutputLine) -> Result<Record, ParseError> {
        let fields = line.fields();
        match line.message_id() {
            ACK => {
                int_field(&fields, 0, "sequence")?;
                Ok(Record::new())
            }
            TLM => {
                if fields.len() != TLM_FIELDS.len() {
                    return Err(ParseError::validation(format!(
                        "expected {} telemetry fields, got {}",
                        TLM_FIELDS.len(),
                        fields.len()
                    )));
                }
                let values = TLM_FIELDS
                    .iter()
                    .enumerate()
                    .map(|(index, name)| float_field(&fields, index, name))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.get(PRESSURE).is_some_and(|pressure| *pressure < 0.0) {
                    return Err(ParseError::validation("pressure must not be negative"));
                }
                let mut record = Record::new();
                for (name, value) in TLM_FIELDS.iter().zip(values) {
                    insert_float(&mut record, name, value);
                }
                Ok(record)
            }
            other => Err(ParseError::validation(format!(
                "unsupported telemetry frame '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parse(raw: &str) -> Result<Record, ParseError> {
        let parser = TelemetryParser::new();
        let id = parser.can_parse(raw).expect("line should be claimed");
        parser.parse(&OutputLine::new(id, Utc::now(), raw))
    }

    #[test]
    fn test_can_parse() {
        let parser = TelemetryParser::new();
        assert_eq!(parser.can_parse("$TLM,21.5,101325,0,0,9.81,3.7"), Some("TLM"));
        assert_eq!(parser.can_parse("$ACK,17"), Some("ACK"));
        assert_eq!(parser.can_parse("$GPGGA,123519"), None);
        assert_eq!(parser.can_parse("TLM,21.5"), None);
    }

    #[test]
    fn test_parse_frame() {
        let record = parse("$TLM,21.5,101325,0.1,-0.2,9.81,3.7").unwrap();
        assert_eq!(record.len(), 6);
        assert_eq!(record["temperature"], 21.5);
        assert_eq!(record["pressure"], 101325.0);
        assert_eq!(record["accel_y"], -0.2);
        assert_eq!(record["battery"], 3.7);
    }

    #[test]
    fn test_ack_is_empty_record() {
        assert!(parse("$ACK,17").unwrap().is_empty());
        assert!(parse("$ACK,seventeen").is_err());
    }

    #[test]
    fn test_wrong_field_count() {
        let error = parse("$TLM,21.5,101325").unwrap_err();
        assert!(error.message.contains("expected 6 telemetry fields, got 2"));
    }

    #[test]
    fn test_negative_pressure() {
        let error = parse("$TLM,21.5,-1,0,0,9.81,3.7").unwrap_err();
        assert_eq!(error.message, "pressure must not be negative");
    }

    #[test]
    fn test_zero_pressure_accepted() {
        let record = parse("$TLM,21.5,0,0,0,9.81,3.7").unwrap();
        assert_eq!(record["pressure"], 0.0);
        assert_eq!(record.len(), 6);
    }

    #[test]
    fn test_non_numeric_field() {
        let error = parse("$TLM,21.5,101325,0,0,heavy,3.7").unwrap_err();
        assert!(error.message.contains("accel_z"));
    }
}
