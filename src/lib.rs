//! A ground-station client that relays probe telemetry to a collection API.
//!
//! A [`ParserManager`] follows a growing log file on a background thread and
//! hands every line to the first matching [`LineParser`]. Non-empty records
//! are appended to a [`RequestQueue`], which a [`SenderWorker`] drains in
//! order. The queue can be paused, resumed and told to skip its current
//! request; a failed submission pauses it and retries the same request once
//! resumed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use telemetry_relay::{HttpApiClient, ParserManager, RequestQueue, SenderWorker, event_channel};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, mut events) = event_channel();
//!     let sink = Arc::new(sink);
//!
//!     let client = HttpApiClient::new("http://localhost:8000/api/", Duration::from_secs(30))?;
//!     let queue = Arc::new(RequestQueue::new(client, sink.clone()));
//!     let _sender = SenderWorker::spawn(queue.clone())?;
//!
//!     let mut parser = ParserManager::new(queue, sink);
//!     parser.start("probe.log")?;
//!
//!     while let Some(event) = events.blocking_next_event() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

mod api;
mod config;
mod dispatcher;
mod error;
mod events;
mod line;
mod manager;
pub mod parser;
mod sender;
mod tail;

#[cfg(test)]
mod test_helpers;

pub use api::{ApiClient, Files, HttpApiClient, encode_datetime};
pub use config::{Config, LogFormat};
pub use dispatcher::OutputParser;
pub use error::{ApiError, Error, ParseError, ParseErrorKind, Result};
pub use events::{Event, EventSender, EventSink, EventStream, NullSink, event_channel};
pub use line::{OutputLine, Record};
pub use manager::ParserManager;
pub use parser::{LineParser, default_parsers};
pub use sender::{Callback, NewRequest, RequestData, RequestQueue, SenderWorker};
pub use tail::{DEFAULT_POLL_INTERVAL, TailReader, follow_lines};
