//! Ordered, pausable delivery of records to the collection API.
//!
//! [`RequestQueue`] is an unbounded FIFO consumed by a single loop (see
//! [`SenderWorker`]). Contents and the pause flag live behind separate locks
//! so that a paused queue keeps accepting new requests.

mod worker;

pub use worker::SenderWorker;

use crate::api::{ApiClient, Files, encode_datetime};
use crate::events::{Event, EventSink};
use crate::line::Record;
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Invoked once a request leaves the queue, whether it was sent or skipped.
pub type Callback = Box<dyn FnOnce() + Send>;

/// A queued request as seen by observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData {
    pub id: u64,
    /// Originating parser or component, for display only.
    pub module: String,
    pub url: String,
    pub data: Record,
    pub files: Option<Files>,
}

/// Builder for [`RequestQueue::add_request`].
pub struct NewRequest {
    module: String,
    url: String,
    data: Record,
    files: Option<Files>,
    append_timestamp: bool,
    callback: Option<Callback>,
}

impl NewRequest {
    /// A request stamped with the enqueue time.
    pub fn new(module: impl Into<String>, url: impl Into<String>, data: Record) -> Self {
        Self {
            module: module.into(),
            url: url.into(),
            data,
            files: None,
            append_timestamp: true,
            callback: None,
        }
    }

    /// Attaches files, which switches the submission to multipart.
    pub fn files(mut self, files: Files) -> Self {
        self.files = Some(files);
        self
    }

    /// Keeps `data` as is; used when the caller already set `timestamp`.
    pub fn without_timestamp(mut self) -> Self {
        self.append_timestamp = false;
        self
    }

    /// Runs `callback` once the request leaves the queue.
    pub fn on_processed(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for NewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewRequest")
            .field("module", &self.module)
            .field("url", &self.url)
            .field("data", &self.data)
            .field("files", &self.files)
            .field("append_timestamp", &self.append_timestamp)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

struct Pending {
    request: RequestData,
    callback: Option<Callback>,
}

struct QueueState {
    items: VecDeque<Pending>,
    next_id: u64,
    skip_current: bool,
}

/// The request queue shared between producers and the sender worker.
pub struct RequestQueue {
    client: Box<dyn ApiClient>,
    events: Arc<dyn EventSink>,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    paused: Mutex<bool>,
    unpaused: Condvar,
    shutdown: AtomicBool,
}

impl RequestQueue {
    /// An empty, unpaused queue submitting through `client`.
    pub fn new(client: impl ApiClient + 'static, events: Arc<dyn EventSink>) -> Self {
        Self {
            client: Box::new(client),
            events,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                next_id: 1,
                skip_current: false,
            }),
            not_empty: Condvar::new(),
            paused: Mutex::new(false),
            unpaused: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Appends a request and returns its id. Never blocks on the pause flag.
    pub fn add_request(&self, request: NewRequest) -> u64 {
        let NewRequest {
            module,
            url,
            mut data,
            files,
            append_timestamp,
            callback,
        } = request;
        if append_timestamp {
            data.insert(
                "timestamp".to_string(),
                Value::String(encode_datetime(Utc::now())),
            );
        }

        let request = {
            let mut state = self.state.lock();
            let request = RequestData {
                id: state.next_id,
                module,
                url,
                data,
                files,
            };
            state.next_id += 1;
            state.items.push_back(Pending {
                request: request.clone(),
                callback,
            });
            request
        };
        self.not_empty.notify_one();

        debug!(id = request.id, module = %request.module, "Request added");
        let id = request.id;
        self.events.emit(Event::RequestAdded(request));
        id
    }

    /// Takes the head of the queue and submits it, retrying after every
    /// failure once the queue is resumed. Blocks while the queue is empty or
    /// paused. Returns `false` only after [`RequestQueue::shutdown`].
    pub fn process_request(&self) -> bool {
        let Some(mut pending) = self.next_pending() else {
            return false;
        };

        loop {
            if !self.wait_while_paused() {
                warn!(
                    id = pending.request.id,
                    paused = self.is_paused(),
                    "Shutdown, request left unsent"
                );
                return false;
            }
            if self.take_skip_current() {
                info!(id = pending.request.id, "Skipping request");
                break;
            }

            self.events.emit(Event::RequestProcessing(pending.request.clone()));

            let request = &pending.request;
            match self
                .client
                .create(&request.url, &request.data, request.files.as_ref())
            {
                Ok(()) => {
                    debug!(id = request.id, url = %request.url, "Request sent");
                    break;
                }
                Err(e) => {
                    error!(
                        id = request.id,
                        module = %request.module,
                        error = %e,
                        "Could not send request"
                    );
                    let error = Arc::new(e);
                    let trace = error.trace();
                    self.events.emit(Event::RequestFailed {
                        request: request.clone(),
                        error,
                        trace,
                    });
                    self.set_paused(true);
                }
            }
        }

        self.events.emit(Event::RequestProcessed(pending.request.clone()));
        if let Some(callback) = pending.callback.take() {
            callback();
        }
        true
    }

    /// (Un)pauses processing. Resuming wakes the consumer.
    pub fn set_paused(&self, paused: bool) {
        {
            let mut flag = self.paused.lock();
            *flag = paused;
            if !paused {
                self.unpaused.notify_all();
            }
        }
        if paused {
            info!("Request queue paused");
        } else {
            info!("Request queue resumed");
        }
        self.events.emit(Event::QueuePaused(paused));
    }

    /// Whether the consumer is currently held back.
    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Skips the request being processed, or the next one taken if none is
    /// in flight. One-shot.
    pub fn set_skip_current(&self) {
        self.state.lock().skip_current = true;
    }

    /// Requests still waiting in the queue, in submission order. The one
    /// being processed is not included.
    pub fn snapshot(&self) -> Vec<RequestData> {
        self.state
            .lock()
            .items
            .iter()
            .map(|pending| pending.request.clone())
            .collect()
    }

    /// Number of requests waiting, excluding the one in flight.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Wakes the consumer and makes `process_request` return `false`. Queued
    /// requests are dropped unsent.
    pub fn shutdown(&self) {
        {
            let _state = self.state.lock();
            self.shutdown.store(true, Ordering::SeqCst);
            self.not_empty.notify_all();
        }
        let _paused = self.paused.lock();
        self.unpaused.notify_all();
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn next_pending(&self) -> Option<Pending> {
        let mut state = self.state.lock();
        loop {
            if self.is_shut_down() {
                return None;
            }
            if let Some(pending) = state.items.pop_front() {
                return Some(pending);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Returns `false` if woken by shutdown.
    fn wait_while_paused(&self) -> bool {
        let mut paused = self.paused.lock();
        while *paused {
            if self.is_shut_down() {
                return false;
            }
            self.unpaused.wait(&mut paused);
        }
        !self.is_shut_down()
    }

    fn take_skip_current(&self) -> bool {
        let mut state = self.state.lock();
        std::mem::take(&mut state.skip_current)
    }
}
