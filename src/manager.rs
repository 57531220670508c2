//! Lifecycle of the background parser worker.

use crate::dispatcher::OutputParser;
use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::sender::RequestQueue;
use crate::tail::{DEFAULT_POLL_INTERVAL, TailReader};
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// Set by the worker when its thread is about to exit.
#[derive(Default)]
struct Finished {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Finished {
    fn mark(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut done = self.done.lock();
        match timeout {
            None => {
                while !*done {
                    self.cond.wait(&mut done);
                }
                true
            }
            Some(timeout) => {
                let deadline = std::time::Instant::now() + timeout;
                while !*done {
                    if self.cond.wait_until(&mut done, deadline).timed_out() {
                        return *done;
                    }
                }
                true
            }
        }
    }

    fn is_done(&self) -> bool {
        *self.done.lock()
    }
}

struct Worker {
    terminate: Arc<AtomicBool>,
    finished: Arc<Finished>,
    handle: Option<JoinHandle<()>>,
}

/// Emits the terminated event however the worker thread ends, panics included.
struct ExitGuard {
    events: Arc<dyn EventSink>,
    terminated_by_user: Arc<AtomicBool>,
    finished: Arc<Finished>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let by_user = self.terminated_by_user.load(Ordering::SeqCst);
        if by_user {
            info!("Parser was terminated by the user");
        } else {
            warn!("Parser terminated unexpectedly");
        }
        self.events.emit(Event::ParserTerminated { by_user });
        self.finished.mark();
    }
}

/// Starts, stops and awaits the parser worker. A fresh worker is created on
/// every start.
pub struct ParserManager {
    queue: Arc<RequestQueue>,
    events: Arc<dyn EventSink>,
    poll_interval: Duration,
    worker: Option<Worker>,
    path: Option<PathBuf>,
    terminated_by_user: Arc<AtomicBool>,
    probe_start_time: Option<DateTime<Utc>>,
}

impl ParserManager {
    /// Creates an idle manager that polls at [`DEFAULT_POLL_INTERVAL`].
    pub fn new(queue: Arc<RequestQueue>, events: Arc<dyn EventSink>) -> Self {
        Self::with_poll_interval(queue, events, DEFAULT_POLL_INTERVAL)
    }

    /// Creates an idle manager whose workers wait `poll_interval` between
    /// reads at the end of the file.
    pub fn with_poll_interval(
        queue: Arc<RequestQueue>,
        events: Arc<dyn EventSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            events,
            poll_interval,
            worker: None,
            path: None,
            terminated_by_user: Arc::new(AtomicBool::new(false)),
            probe_start_time: None,
        }
    }

    /// Whether a worker has been started and has not exited yet.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.finished.is_done())
    }

    /// The resolved path of the file being (or last) parsed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Starts a worker following `path`.
    ///
    /// Fails with [`Error::AlreadyRunning`] if a worker is active and with
    /// [`Error::FileNotFound`] if the path does not resolve to a regular
    /// file. The file is opened before the worker is spawned, so open errors
    /// are returned here too.
    pub fn start<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.reap();

        let path = path.as_ref();
        let not_found = || Error::FileNotFound {
            path: path.display().to_string(),
        };
        let resolved = std::fs::canonicalize(path).map_err(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "Parser start failed: could not find data file"
            );
            not_found()
        })?;
        if !resolved.is_file() {
            warn!(
                path = %resolved.display(),
                "Parser start failed: data file is not a regular file"
            );
            return Err(not_found());
        }
        info!(path = %resolved.display(), "Starting parser");

        let parser = OutputParser::with_default_parsers(self.queue.clone(), self.events.clone());
        let reader = TailReader::open(&resolved, self.poll_interval, parser.termination_flag())?;
        self.spawn_worker(resolved, parser, reader)
    }

    /// Runs `parser` over `lines` on a fresh worker thread.
    fn spawn_worker<I>(&mut self, path: PathBuf, parser: OutputParser, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<String>> + Send + 'static,
    {
        let terminate = parser.termination_flag();
        self.terminated_by_user.store(false, Ordering::SeqCst);
        let finished = Arc::new(Finished::default());
        let exit_finished = finished.clone();
        let terminated_by_user = self.terminated_by_user.clone();
        let events = self.events.clone();

        let handle = thread::Builder::new()
            .name("parser".to_string())
            .spawn(move || {
                let _guard = ExitGuard {
                    events: events.clone(),
                    terminated_by_user,
                    finished: exit_finished,
                };
                events.emit(Event::ParserStarted);
                if let Err(e) = parser.parse_lines(lines) {
                    warn!(error = %e, "Could not parse file");
                }
            })
            .map_err(Error::WorkerSpawn)?;

        self.path = Some(path);
        self.worker = Some(Worker {
            terminate,
            finished,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Asks the worker to stop at its next poll. Does nothing if idle.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.as_ref().filter(|_| self.is_running()) {
            self.terminated_by_user.store(true, Ordering::SeqCst);
            worker.terminate.store(true, Ordering::SeqCst);
        }
    }

    /// Waits for the worker to exit. `None` waits indefinitely. Returns
    /// `true` if nothing is running or the worker exited in time.
    pub fn await_termination(&mut self, timeout: Option<Duration>) -> bool {
        let Some(worker) = self.worker.as_ref() else {
            return true;
        };
        let exited = worker.finished.wait(timeout);
        if exited {
            self.reap();
        }
        exited
    }

    /// When the probe was launched, if known.
    pub fn probe_start_time(&self) -> Option<DateTime<Utc>> {
        self.probe_start_time
    }

    pub fn set_probe_start_time(&mut self, start: DateTime<Utc>) {
        self.probe_start_time = Some(start);
        info!(probe_start_time = %start, "Probe start time set");
    }

    /// Joins a worker that has already signalled completion.
    fn reap(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!("Parser worker panicked");
                }
            }
        }
    }
}

impl Drop for ParserManager {
    fn drop(&mut self) {
        self.stop();
        self.await_termination(None);
    }
}
