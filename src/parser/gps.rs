//! NMEA 0183 position sentences from the probe's GPS receiver.

use super::{LineParser, field, float_field, insert_float, int_field, sentence_id};
use crate::error::ParseError;
use crate::line::{OutputLine, Record};
use chrono::NaiveTime;
use serde_json::Value;

const GGA: &str = "GPGGA";
const RMC: &str = "GPRMC";

/// Parses `$GPGGA` fixes and `$GPRMC` minimum navigation sentences.
#[derive(Debug, Clone)]
pub struct GpsParser {
    url: String,
}

impl GpsParser {
    pub fn new() -> Self {
        Self {
            url: "gps".to_string(),
        }
    }

    fn parse_gga(&self, fields: &[&str]) -> Result<Record, ParseError> {
        let mut record = Record::new();
        record.insert("time".to_string(), Value::String(parse_time(fields, 0)?));

        // Quality 0 means the receiver has no fix yet; the position fields are blank.
        let fix_quality = int_field(fields, 5, "fix quality")?;
        if fix_quality == 0 {
            return Ok(Record::new());
        }

        insert_float(&mut record, "latitude", parse_coordinate(fields, 1, 2, 'N', 'S', 90.0)?);
        insert_float(&mut record, "longitude", parse_coordinate(fields, 3, 4, 'E', 'W', 180.0)?);
        record.insert("fix_quality".to_string(), fix_quality.into());
        record.insert(
            "satellites".to_string(),
            int_field(fields, 6, "satellites")?.into(),
        );
        insert_float(&mut record, "hdop", float_field(fields, 7, "hdop")?);
        insert_float(&mut record, "altitude", float_field(fields, 8, "altitude")?);
        Ok(record)
    }

    fn parse_rmc(&self, fields: &[&str]) -> Result<Record, ParseError> {
        let time = parse_time(fields, 0)?;
        let status = field(fields, 1, "status")?;
        match status {
            "A" => {}
            // Void: no valid navigation data to report.
            "V" => return Ok(Record::new()),
            other => {
                return Err(ParseError::validation(format!(
                    "unknown RMC status '{}'",
                    other
                )));
            }
        }

        let mut record = Record::new();
        record.insert("time".to_string(), Value::String(time));
        record.insert("status".to_string(), Value::String(status.to_string()));
        insert_float(&mut record, "latitude", parse_coordinate(fields, 2, 3, 'N', 'S', 90.0)?);
        insert_float(&mut record, "longitude", parse_coordinate(fields, 4, 5, 'E', 'W', 180.0)?);
        insert_float(&mut record, "speed_knots", float_field(fields, 6, "speed")?);
        insert_float(&mut record, "course", float_field(fields, 7, "course")?);
        Ok(record)
    }
}

impl Default for GpsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for GpsParser {
    fn name(&self) -> &'static str {
        "GpsParser"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn can_parse(&self, line: &str) -> Option<&'static str> {
        match sentence_id(line)? {
            GGA => Some(GGA),
            RMC => Some(RMC),
            _ => None,
        }
    }

    fn parse(&self, line: &OutputLine) -> Result<Record, ParseError> {
        verify_checksum(line.raw_text())?;
        let fields = line.fields();
        match line.message_id() {
            GGA => self.parse_gga(&fields),
            RMC => self.parse_rmc(&fields),
            other => Err(ParseError::validation(format!(
                "unsupported GPS sentence '{}'",
                other
            ))),
        }
    }
}

/// Checks the optional `*hh` suffix against the XOR of the bytes between
/// `$` and `*`.
fn verify_checksum(raw: &str) -> Result<(), ParseError> {
    let Some((body, expected)) = raw.rsplit_once('*') else {
        return Ok(());
    };
    let expected = u8::from_str_radix(expected.trim(), 16)
        .map_err(|_| ParseError::validation(format!("invalid checksum '{}'", expected)))?;
    let actual = body
        .strip_prefix('$')
        .unwrap_or(body)
        .bytes()
        .fold(0u8, |acc, byte| acc ^ byte);
    if actual != expected {
        return Err(ParseError::validation(format!(
            "checksum mismatch: expected {:02X}, computed {:02X}",
            expected, actual
        )));
    }
    Ok(())
}

/// `hhmmss[.ss]` to `hh:mm:ss`.
fn parse_time(fields: &[&str], index: usize) -> Result<String, ParseError> {
    let raw = field(fields, index, "time")?;
    let whole = raw.split('.').next().unwrap_or_default();
    NaiveTime::parse_from_str(whole, "%H%M%S")
        .map(|time| time.format("%H:%M:%S").to_string())
        .map_err(|_| ParseError::validation(format!("invalid UTC time '{}'", raw)))
}

/// `dddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(
    fields: &[&str],
    value_index: usize,
    hemisphere_index: usize,
    positive: char,
    negative: char,
    limit: f64,
) -> Result<f64, ParseError> {
    let raw = float_field(fields, value_index, "coordinate")?;
    if raw < 0.0 {
        return Err(ParseError::validation(format!(
            "negative coordinate {}",
            raw
        )));
    }
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(ParseError::validation(format!(
            "coordinate minutes out of range in {}",
            raw
        )));
    }
    let value = degrees + minutes / 60.0;
    if value > limit {
        return Err(ParseError::validation(format!(
            "coordinate {} exceeds {} degrees",
            value, limit
        )));
    }

    let hemisphere = field(fields, hemisphere_index, "hemisphere")?;
    match hemisphere.chars().next() {
        Some(c) if c == positive && hemisphere.len() == 1 => Ok(value),
        Some(c) if c == negative && hemisphere.len() == 1 => Ok(-value),
        _ => Err(ParseError::validation(format!(
            "invalid hemisphere '{}'",
            hemisphere
        ))),
    }
}
