//! Line parsers for the message families found in the probe log.
//!
//! Each parser first sniffs a line with [`LineParser::can_parse`], which is a
//! pure query, and only then extracts fields with [`LineParser::parse`].

mod gps;
mod kundt;
mod telemetry;

pub use gps::GpsParser;
pub use kundt::KundtParser;
pub use telemetry::TelemetryParser;

use crate::error::ParseError;
use crate::line::{OutputLine, Record};
use regex::Regex;
use std::sync::OnceLock;

/// A pluggable parser for one message family.
pub trait LineParser: Send {
    /// Name used to attribute records and failures.
    fn name(&self) -> &'static str;

    /// Relative API URL the records are posted to.
    fn url(&self) -> &str;

    /// Returns the message id if this parser owns the line. Must not fail
    /// and must not have side effects.
    fn can_parse(&self, line: &str) -> Option<&'static str>;

    /// Extracts the record from a line previously accepted by `can_parse`.
    fn parse(&self, line: &OutputLine) -> Result<Record, ParseError>;
}

/// The shipped parsers, in dispatch priority order.
pub fn default_parsers() -> Vec<Box<dyn LineParser>> {
    vec![
        Box::new(GpsParser::new()),
        Box::new(TelemetryParser::new()),
        Box::new(KundtParser::new()),
    ]
}

/// Captures the message id of a `$ID,...` sentence.
pub(crate) fn sentence_id(line: &str) -> Option<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^\$([A-Z]{2,5}),").ok())
        .as_ref()?;
    pattern
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

/// Returns the field at `index` or a validation error naming it.
pub(crate) fn field<'a>(
    fields: &[&'a str],
    index: usize,
    name: &str,
) -> Result<&'a str, ParseError> {
    match fields.get(index) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim()),
        Some(_) => Err(ParseError::validation(format!(
            "field {} ({}) is empty",
            index, name
        ))),
        None => Err(ParseError::validation(format!(
            "field {} ({}) is missing",
            index, name
        ))),
    }
}

pub(crate) fn float_field(fields: &[&str], index: usize, name: &str) -> Result<f64, ParseError> {
    let raw = field(fields, index, name)?;
    let value: f64 = raw.parse().map_err(|_| {
        ParseError::validation(format!(
            "field {} ({}) is not a number: '{}'",
            index, name, raw
        ))
    })?;
    if !value.is_finite() {
        return Err(ParseError::validation(format!(
            "field {} ({}) is not finite",
            index, name
        )));
    }
    Ok(value)
}

pub(crate) fn int_field(fields: &[&str], index: usize, name: &str) -> Result<u64, ParseError> {
    let raw = field(fields, index, name)?;
    raw.parse().map_err(|_| {
        ParseError::validation(format!(
            "field {} ({}) is not an integer: '{}'",
            index, name, raw
        ))
    })
}

/// Inserts a float, which `serde_json` can only refuse for non-finite values
/// that the field helpers already reject.
pub(crate) fn insert_float(record: &mut Record, key: &str, value: f64) {
    if let Some(number) = serde_json::Number::from_f64(value) {
        record.insert(key.to_string(), number.into());
    }
}
