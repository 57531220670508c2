//! Routes each raw line to the first parser that claims it.

use crate::api::encode_datetime;
use crate::error::{Error, ParseError, Result};
use crate::events::{Event, EventSink};
use crate::line::OutputLine;
use crate::parser::{LineParser, default_parsers};
use crate::sender::{NewRequest, RequestQueue};
use crate::tail::TailReader;
use chrono::Utc;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, warn};

/// Parses the output file indefinitely, queueing a request for every
/// non-empty record.
pub struct OutputParser {
    parsers: Vec<Box<dyn LineParser>>,
    queue: Arc<RequestQueue>,
    events: Arc<dyn EventSink>,
    terminated: Arc<AtomicBool>,
}

impl OutputParser {
    /// `parsers` are consulted in the given order.
    pub fn new(
        parsers: Vec<Box<dyn LineParser>>,
        queue: Arc<RequestQueue>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            parsers,
            queue,
            events,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// GPS, then telemetry, then Kundt.
    pub fn with_default_parsers(queue: Arc<RequestQueue>, events: Arc<dyn EventSink>) -> Self {
        Self::new(default_parsers(), queue, events)
    }

    /// Parses a single line.
    ///
    /// Only the first parser whose `can_parse` accepts the line is used; if
    /// its `parse` fails the error is final for this line and carries that
    /// parser's name. A line no parser accepts yields an unparsed error with
    /// no parser name.
    pub fn dispatch(&self, line: &str) -> std::result::Result<(), ParseError> {
        for parser in &self.parsers {
            let Some(message_id) = parser.can_parse(line) else {
                continue;
            };

            let output_line = OutputLine::new(message_id, Utc::now(), line);
            let mut record = match parser.parse(&output_line) {
                Ok(record) => record,
                Err(e) => {
                    self.events.emit(Event::LineParseFailed(output_line));
                    return Err(e.with_parser(parser.name()));
                }
            };
            self.events.emit(Event::LineParsed(output_line.clone()));

            if !record.is_empty() {
                record.insert(
                    "timestamp".to_string(),
                    Value::String(encode_datetime(output_line.timestamp())),
                );
                self.queue.add_request(
                    NewRequest::new(parser.name(), parser.url(), record).without_timestamp(),
                );
            }
            return Ok(());
        }

        Err(ParseError::unparsed())
    }

    /// Opens `path` and parses it until [`OutputParser::mark_terminated`] is
    /// called. Failing to open the file is returned before any line is read.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P, poll_interval: Duration) -> Result<()> {
        let reader = TailReader::open(path, poll_interval, self.terminated.clone())?;
        self.parse_lines(reader)
    }

    /// Drives an already open reader. Per-line failures are logged and
    /// skipped; only I/O errors end the loop.
    pub fn parse_lines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        for line in lines {
            match line {
                Ok(line) => {
                    if let Err(e) = self.dispatch(&line) {
                        log_parse_error(&line, &e);
                    }
                }
                Err(Error::Utf8(e)) => warn!(error = %e, "Skipping line that is not valid UTF-8"),
                Err(e) => return Err(e),
            }
            if self.is_terminated() {
                break;
            }
        }
        Ok(())
    }

    /// Makes `parse_file` return after the current line, or after at most
    /// one poll interval.
    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn termination_flag(&self) -> Arc<AtomicBool> {
        self.terminated.clone()
    }
}

fn log_parse_error(line: &str, e: &ParseError) {
    match &e.parser_name {
        Some(parser) => error!(parser = %parser, line, error = %e, "Could not parse line"),
        None => error!(line, error = %e, "Could not parse line"),
    }
}
