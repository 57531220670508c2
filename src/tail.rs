//! Tail-follow reading of a log that another process keeps appending to.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// How long to wait after a read returned nothing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An endless iterator over the complete lines of a growing file.
///
/// End of file is treated like a read that would block: the reader sleeps
/// for the poll interval and tries again. Iteration ends only once the stop
/// flag is raised, which is checked once per poll.
pub struct TailReader {
    reader: BufReader<File>,
    pending: Vec<u8>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
}

impl TailReader {
    /// Opens `path` for non-blocking reads. Fails immediately if the file
    /// cannot be opened.
    pub fn open<P: AsRef<Path>>(
        path: P,
        poll_interval: Duration,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        let file = open_non_blocking(path.as_ref())?;
        Ok(Self {
            reader: BufReader::new(file),
            pending: Vec::new(),
            poll_interval,
            stop,
        })
    }

    /// One read attempt. `Ok(None)` means no complete line is available yet.
    fn poll_line(&mut self) -> Result<Option<String>> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) if is_retryable(&e) => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        }
        // A partial line stays buffered until the writer finishes it.
        if self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }

        let mut line = std::mem::take(&mut self.pending);
        strip_line_ending(&mut line);
        Ok(Some(String::from_utf8(line)?))
    }
}

impl Iterator for TailReader {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.stop.load(Ordering::SeqCst) {
            match self.poll_line() {
                Ok(Some(line)) if line.is_empty() => {
                    warn!("Empty line received");
                }
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Follows `path` with the default poll interval until `stop` is raised.
pub fn follow_lines<P: AsRef<Path>>(path: P, stop: Arc<AtomicBool>) -> Result<TailReader> {
    TailReader::open(path, DEFAULT_POLL_INTERVAL, stop)
}

#[cfg(unix)]
fn open_non_blocking(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_non_blocking(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

/// Errors that only mean "no data right now".
fn is_retryable(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

/// Removes every trailing `\r` and `\n`.
fn strip_line_ending(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}
