//! Dispatcher - fans events out to their subscribers
//!
//! Every delivery runs as its own task so one slow or broken subscriber never
//! holds up the others or the next event.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use super::registry::{Subscriber, Subscribers};
use super::types::Event;

/// Delivers events to the subscribers registered for their kind
#[derive(Clone)]
pub struct Dispatcher {
    subscribers: Arc<Subscribers>,
}

impl Dispatcher {
    pub fn new(subscribers: Arc<Subscribers>) -> Self {
        Self { subscribers }
    }

    /// The registry this dispatcher reads from
    pub fn subscribers(&self) -> &Arc<Subscribers> {
        &self.subscribers
    }

    /// Deliver `event` to its kind's subscribers and to `All` subscribers
    ///
    /// Returns immediately with the number of deliveries started. Must be
    /// called from within a Tokio runtime.
    ///
    /// Callbacks run on the blocking pool; a panic is logged and contained.
    /// Channels get a non-blocking send first. When a channel is full the
    /// send is handed to a background task that waits for capacity, so a
    /// stalled receiver grows pending tasks instead of stalling dispatch, and
    /// events delivered that way may arrive out of order.
    ///
    /// The blocking pool is bounded (512 threads unless the runtime is built
    /// with a different `max_blocking_threads`). Once that many callbacks are
    /// hung, later callback deliveries wait for a free thread; channel
    /// deliveries and dispatch itself are unaffected.
    pub fn dispatch(&self, event: Event) -> usize {
        let targets = self.subscribers.targets(event.kind);
        debug!(kind = %event.kind, seq = event.sequence_id, targets = targets.len(), "Dispatcher::dispatch");

        let count = targets.len();
        for subscriber in targets {
            deliver(subscriber, event.clone());
        }
        count
    }
}

fn deliver(subscriber: Subscriber, event: Event) {
    match subscriber {
        Subscriber::Callback(callback) => {
            let kind = event.kind;
            let handle = tokio::task::spawn_blocking(move || callback(event));
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        error!(%kind, "deliver: subscriber callback panicked");
                    } else {
                        debug!(%kind, error = %e, "deliver: callback task cancelled");
                    }
                }
            });
        }
        Subscriber::Channel(tx) => match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(kind = %event.kind, "deliver: subscriber channel full, sending in background");
                tokio::spawn(async move {
                    if tx.send(event).await.is_err() {
                        debug!("deliver: subscriber channel closed while waiting");
                    }
                });
            }
            Err(TrySendError::Closed(event)) => {
                debug!(kind = %event.kind, "deliver: subscriber channel closed, dropping");
            }
        },
    }
}
