//! Error types for the telemetry relay.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for relay operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when opening or reading the telemetry log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding errors when reading file content.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The data file could not be resolved.
    #[error("Data file not found: {path}")]
    FileNotFound { path: String },

    /// A parser worker is already running.
    #[error("The parser worker is already running")]
    AlreadyRunning,

    /// A line could not be dispatched to a parser.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A request could not be delivered to the collection API.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// A background thread could not be spawned.
    #[error("Could not spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// A convenient Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while turning a line into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No registered parser claimed the line.
    Unparsed,
    /// A parser claimed the line but its content is malformed.
    Validation,
}

/// A per-line failure. `parser_name` is stamped by the dispatcher once a
/// parser has claimed the line; parsers themselves never set it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub parser_name: Option<String>,
}

impl ParseError {
    /// The line was not recognized by any parser.
    pub fn unparsed() -> Self {
        Self {
            kind: ParseErrorKind::Unparsed,
            message: "Line was not parsed by any parser".to_string(),
            parser_name: None,
        }
    }

    /// The claimed line failed validation.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Validation,
            message: message.into(),
            parser_name: None,
        }
    }

    /// Records which parser produced the error.
    pub fn with_parser(mut self, parser_name: impl Into<String>) -> Self {
        self.parser_name = Some(parser_name.into());
        self
    }
}

/// Failures while submitting a request to the collection API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Could not attach file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Renders the error and its `source()` chain, outermost first.
    pub fn trace(&self) -> Vec<String> {
        let mut trace = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(inner) = source {
            trace.push(inner.to_string());
            source = inner.source();
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => {}
            _ => panic!("Expected Error::Io variant"),
        }

        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
    }

    #[test]
    fn test_utf8_error_conversion() {
        let utf8_error = String::from_utf8(vec![0, 159, 146, 150]).unwrap_err();
        let error: Error = utf8_error.into();

        assert!(matches!(error, Error::Utf8(_)));
        assert!(error.to_string().contains("UTF-8 decoding error"));
    }

    #[test]
    fn test_file_not_found_error() {
        let error = Error::FileNotFound {
            path: "/path/to/missing/probe.log".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Data file not found: /path/to/missing/probe.log"
        );
    }

    #[test]
    fn test_unparsed_error_has_no_parser() {
        let error = ParseError::unparsed();
        assert_eq!(error.kind, ParseErrorKind::Unparsed);
        assert_eq!(error.parser_name, None);
        assert_eq!(error.to_string(), "Line was not parsed by any parser");
    }

    #[test]
    fn test_validation_error_with_parser() {
        let error = ParseError::validation("bad latitude").with_parser("GpsParser");
        assert_eq!(error.kind, ParseErrorKind::Validation);
        assert_eq!(error.parser_name.as_deref(), Some("GpsParser"));
        assert_eq!(error.to_string(), "bad latitude");
    }

    #[test]
    fn test_parse_error_is_transparent() {
        let error: Error = ParseError::validation("checksum mismatch").into();
        assert_eq!(error.to_string(), "checksum mismatch");
    }

    #[test]
    fn test_api_error_trace_walks_sources() {
        let error = ApiError::File {
            path: PathBuf::from("/tmp/spectrum.png"),
            source: IoError::new(ErrorKind::PermissionDenied, "Access denied"),
        };

        let trace = error.trace();
        assert_eq!(trace.len(), 2);
        assert!(trace[0].contains("spectrum.png"));
        assert_eq!(trace[1], "Access denied");
    }

    #[test]
    fn test_status_error_display() {
        let error = ApiError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP error: 503 - maintenance");
        assert_eq!(error.trace(), vec!["HTTP error: 503 - maintenance".to_string()]);
    }

    #[test]
    fn test_error_send_sync_traits() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
        assert_send::<ApiError>();
        assert_sync::<ApiError>();
    }
}
