//! Dedicated thread driving the request queue.

use super::RequestQueue;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Runs [`RequestQueue::process_request`] in a loop on its own thread for as
/// long as the queue is not shut down.
pub struct SenderWorker {
    queue: Arc<RequestQueue>,
    handle: Option<JoinHandle<()>>,
}

impl SenderWorker {
    /// Starts the thread named `sender`.
    pub fn spawn(queue: Arc<RequestQueue>) -> Result<Self> {
        let worker_queue = queue.clone();
        let handle = thread::Builder::new()
            .name("sender".to_string())
            .spawn(move || {
                info!("Sender worker started");
                while worker_queue.process_request() {}
                info!("Sender worker stopped");
            })
            .map_err(Error::WorkerSpawn)?;

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// The queue this worker drains.
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// Whether the thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the worker after the request in flight, if any, and waits for
    /// the thread to exit.
    pub fn shutdown(mut self) {
        self.queue.shutdown();
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Sender worker panicked");
            }
        }
    }
}

impl Drop for SenderWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.queue.shutdown();
            self.join_thread();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, event_channel};
    use crate::line::Record;
    use crate::sender::NewRequest;
    use crate::test_helpers::RecordingClient;

    #[test]
    fn test_worker_drains_queue() {
        let client = Arc::new(RecordingClient::new());
        let (sink, mut events) = event_channel();
        let queue = Arc::new(RequestQueue::new(client.clone(), Arc::new(sink)));
        let worker = SenderWorker::spawn(queue.clone()).unwrap();
        assert!(worker.is_running());

        for i in 1..=5 {
            queue.add_request(NewRequest::new("test", format!("url/{}", i), Record::new()));
        }

        let mut processed = Vec::new();
        while processed.len() < 5 {
            match events.blocking_next_event() {
                Some(Event::RequestProcessed(request)) => processed.push(request.id),
                Some(_) => {}
                None => panic!("event stream closed"),
            }
        }
        assert_eq!(processed, vec![1, 2, 3, 4, 5]);

        worker.shutdown();
        assert_eq!(client.calls().len(), 5);
    }

    #[test]
    fn test_drop_stops_idle_worker() {
        let queue = Arc::new(RequestQueue::new(
            Arc::new(RecordingClient::new()),
            Arc::new(crate::events::NullSink),
        ));
        let worker = SenderWorker::spawn(queue.clone()).unwrap();
        drop(worker);
        assert!(!queue.process_request());
    }
}
