//! Stream reader task - owns the event stream connection
//!
//! Connects, frames records into the watcher's queue, and reconnects on any
//! failure until the running flag drops. The body stream is owned by this
//! task alone and dropped (closing the connection) before every reconnect
//! and on every exit.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::state::WatcherState;
use crate::events::{Event, EventKind, records};
use crate::server::{ServerError, Transport};

/// Event stream endpoint
pub const EVENT_STREAM_PATH: &str = "++eventStream";

/// Query parameters selecting the text record format
pub const EVENT_STREAM_PARAMS: &[(&str, &str)] = &[("version", "3")];

/// Work items for the watcher's dispatch loop
pub(crate) enum QueueItem {
    /// Raw record, parsed by the dispatch loop
    Record(String),
    /// Ready-made event (synthetic or injected)
    Event(Event),
}

/// Why a streaming session ended
enum StreamEnd {
    /// Stop was requested
    Stopped,
    /// Dispatch loop went away
    QueueClosed,
    /// Server closed the stream
    Eof,
    /// Transport failed mid-stream
    Failed(ServerError),
}

pub(crate) struct Reader {
    pub transport: Arc<dyn Transport>,
    pub queue: mpsc::Sender<QueueItem>,
    pub running: watch::Receiver<bool>,
    pub state: Arc<watch::Sender<WatcherState>>,
    pub retry_interval: Duration,
}

impl Reader {
    pub async fn run(mut self) {
        debug!(retry_ms = self.retry_interval.as_millis() as u64, "Reader::run: started");

        while *self.running.borrow() {
            self.transition(WatcherState::Connecting);

            let connect = self.transport.get_stream(EVENT_STREAM_PATH, EVENT_STREAM_PARAMS);
            let result = tokio::select! {
                result = connect => result,
                _ = self.running.wait_for(|running| !*running) => break,
            };

            let body = match result {
                Ok(body) => body,
                Err(e) => {
                    match connect_failure_hint(&e) {
                        Some(hint) => warn!(error = %e, hint, "Reader::run: event stream connect failed"),
                        None => warn!(error = %e, "Reader::run: event stream connect failed"),
                    }
                    self.transition(WatcherState::Disconnected);
                    if !self.enqueue_synthetic(EventKind::Disconnected, e.to_string()).await {
                        break;
                    }
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            info!("Reader::run: connected to event stream");
            self.transition(WatcherState::Streaming);
            if !self.enqueue_synthetic(EventKind::Connected, "connected to event stream").await {
                break;
            }

            let mut stream = Box::pin(records(body));
            let mut received = 0usize;
            let end = loop {
                // Stop wins over a stream that always has data ready
                let next = tokio::select! {
                    biased;
                    _ = self.running.wait_for(|running| !*running) => break StreamEnd::Stopped,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(record)) => {
                        received += 1;
                        if self.queue.send(QueueItem::Record(record)).await.is_err() {
                            break StreamEnd::QueueClosed;
                        }
                    }
                    Some(Err(error)) => break StreamEnd::Failed(error),
                    None => break StreamEnd::Eof,
                }
            };
            // Closes the connection
            drop(stream);

            let message = match end {
                StreamEnd::Stopped | StreamEnd::QueueClosed => break,
                StreamEnd::Eof => "event stream closed by server".to_string(),
                StreamEnd::Failed(error) => format!("event stream read failed: {}", error),
            };
            warn!(%message, received, "Reader::run: disconnected");
            self.transition(WatcherState::Disconnected);
            if !self.enqueue_synthetic(EventKind::Disconnected, message).await {
                break;
            }
            // A server that accepts and immediately hangs up would otherwise spin
            if received == 0 && !self.pause().await {
                break;
            }
        }

        debug!("Reader::run: exiting");
    }

    /// Update the shared state unless stop has already begun
    fn transition(&self, to: WatcherState) {
        self.state.send_if_modified(|state| {
            if state.is_terminal() || *state == to {
                false
            } else {
                debug!(from = %state, %to, "Reader::transition");
                *state = to;
                true
            }
        });
    }

    async fn enqueue_synthetic(&self, kind: EventKind, message: impl Into<String>) -> bool {
        let event = Event::synthetic(kind, None, message);
        self.queue.send(QueueItem::Event(event)).await.is_ok()
    }

    /// Sleep for the retry interval; false if stop arrived first
    async fn pause(&mut self) -> bool {
        debug!(retry_ms = self.retry_interval.as_millis() as u64, "Reader::pause: waiting before reconnect");
        tokio::select! {
            _ = tokio::time::sleep(self.retry_interval) => true,
            _ = self.running.wait_for(|running| !*running) => false,
        }
    }
}

/// Operator hint for failures that retrying alone will not fix
///
/// The reader retries every failure; this only sharpens the log line.
fn connect_failure_hint(error: &ServerError) -> Option<&'static str> {
    if error.is_unauthorized() {
        Some("server rejected the credentials; check username and password-env")
    } else if !error.is_retryable() {
        Some("server response is not an event stream; check the url")
    } else {
        None
    }
}
