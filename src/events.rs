//! Notifications published by the parser and sender workers.

use crate::error::ApiError;
use crate::line::OutputLine;
use crate::sender::RequestData;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Everything the presentation layer can observe.
#[derive(Debug, Clone)]
pub enum Event {
    ParserStarted,
    ParserTerminated { by_user: bool },
    LineParsed(OutputLine),
    LineParseFailed(OutputLine),
    RequestAdded(RequestData),
    RequestProcessing(RequestData),
    RequestProcessed(RequestData),
    QueuePaused(bool),
    RequestFailed {
        request: RequestData,
        error: Arc<ApiError>,
        trace: Vec<String>,
    },
}

/// Receives events from the workers. Implementations are called from the
/// worker threads and must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// The sending half of [`event_channel`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink for EventSender {
    fn emit(&self, event: Event) {
        // Nobody listening is not an error.
        let _ = self.tx.send(event);
    }
}

/// A stream of events, usable from async code or polled from a thread.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Returns the next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Blocks the current thread until an event arrives. Returns `None` once
    /// every sender is dropped. Must not be called from an async context.
    pub fn blocking_next_event(&mut self) -> Option<Event> {
        self.receiver.blocking_recv()
    }

    /// Drains the events queued so far.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Creates a connected sink and stream.
pub fn event_channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventStream { receiver: rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_try_next_event() {
        let (sink, mut stream) = event_channel();
        assert!(stream.try_next_event().is_none());

        sink.emit(Event::QueuePaused(true));
        assert!(matches!(stream.try_next_event(), Some(Event::QueuePaused(true))));
        assert!(stream.try_next_event().is_none());
    }

    #[test]
    fn test_drain_preserves_order() {
        let (sink, mut stream) = event_channel();
        sink.emit(Event::ParserStarted);
        sink.emit(Event::ParserTerminated { by_user: true });

        let events = stream.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::ParserStarted));
        assert!(matches!(events[1], Event::ParserTerminated { by_user: true }));
    }

    #[test]
    fn test_emit_after_stream_dropped() {
        let (sink, stream) = event_channel();
        drop(stream);
        sink.emit(Event::ParserStarted);
    }

    #[tokio::test]
    async fn test_stream_ends_when_senders_dropped() {
        let (sink, mut stream) = event_channel();
        let worker_sink = sink.clone();

        std::thread::spawn(move || {
            worker_sink.emit(Event::QueuePaused(false));
        })
        .join()
        .unwrap();
        drop(sink);

        assert!(matches!(stream.next().await, Some(Event::QueuePaused(false))));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_blocking_next_event() {
        let (sink, mut stream) = event_channel();
        let handle = std::thread::spawn(move || {
            sink.emit(Event::ParserStarted);
        });

        assert!(matches!(stream.blocking_next_event(), Some(Event::ParserStarted)));
        handle.join().unwrap();
        assert!(stream.blocking_next_event().is_none());
    }

    #[test]
    fn test_stream_with_block_on() {
        let (sink, mut stream) = event_channel();
        sink.emit(Event::QueuePaused(true));
        let event = tokio_test::block_on(stream.next());
        assert!(matches!(event, Some(Event::QueuePaused(true))));
    }

    #[test]
    fn test_null_sink() {
        NullSink.emit(Event::ParserStarted);
    }
}
