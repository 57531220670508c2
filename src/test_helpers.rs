//! Test utilities: scratch telemetry logs and a recording API client.

use crate::api::{ApiClient, Files};
use crate::error::ApiError;
use crate::line::Record;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new empty telemetry log
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("probe.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Append raw bytes exactly as given, without adding a line ending
    pub fn append_raw(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Append a line terminated the way the probe link writes it
    pub fn append_line(&self, line: &str) -> std::io::Result<()> {
        self.append_raw(&format!("{}\r\n", line))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Records every submission. The first `failures` calls fail with a 503.
pub struct RecordingClient {
    calls: Mutex<Vec<(String, Record)>>,
    failures: Mutex<usize>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(failures),
        }
    }

    pub fn calls(&self) -> Vec<(String, Record)> {
        self.calls.lock().clone()
    }
}

impl ApiClient for RecordingClient {
    fn create(&self, url: &str, data: &Record, _files: Option<&Files>) -> Result<(), ApiError> {
        self.calls.lock().push((url.to_string(), data.clone()));
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_append_line_uses_crlf() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append_line("$ACK,1").unwrap();
        temp_file.append_line("$ACK,2").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "$ACK,1\r\n$ACK,2\r\n");
    }

    #[test]
    fn test_recording_client_fails_then_succeeds() {
        let client = RecordingClient::failing(1);
        assert!(client.create("gps", &Record::new(), None).is_err());
        assert!(client.create("gps", &Record::new(), None).is_ok());
        assert_eq!(client.calls().len(), 2);
    }
}
