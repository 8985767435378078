//! EventWatcher - supervises the event stream and dispatches its events

use std::future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::reader::{QueueItem, Reader};
use super::state::{WatchError, WatcherState};
use crate::config::WatcherConfig;
use crate::events::{Dispatcher, Event, EventKind, Subscriber, Subscribers, parse_event};
use crate::server::{CameraLookup, Refresh, Server, Transport};

/// Default capacity of the internal event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Long-lived watcher for the server's event stream
///
/// `watch()` connects and keeps reconnecting until `stop()` is called,
/// parsing each record into an [`Event`] and dispatching it to the bound
/// subscribers. Link health and refresh outcomes are reported as synthetic
/// events (`Connected`, `Disconnected`, `Refreshed`, `RefreshFailed`).
///
/// Internally a reader task owns the connection and feeds a bounded queue;
/// the task calling `watch()` drains that queue, runs the refresh timer and
/// listens for stop. A full queue makes the reader wait; nothing is dropped.
pub struct EventWatcher {
    transport: Arc<dyn Transport>,
    cameras: Arc<dyn CameraLookup>,
    refresher: Arc<dyn Refresh>,
    dispatcher: Dispatcher,
    queue_capacity: usize,
    running: watch::Sender<bool>,
    state: Arc<watch::Sender<WatcherState>>,
    queue: Mutex<Option<mpsc::Sender<QueueItem>>>,
}

impl EventWatcher {
    /// Create a watcher over the given collaborators
    pub fn new(transport: Arc<dyn Transport>, cameras: Arc<dyn CameraLookup>, refresher: Arc<dyn Refresh>) -> Self {
        debug!("EventWatcher::new: called");
        let (running, _) = watch::channel(false);
        let (state, _) = watch::channel(WatcherState::Idle);
        Self {
            transport,
            cameras,
            refresher,
            dispatcher: Dispatcher::new(Arc::new(Subscribers::new())),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            running,
            state: Arc::new(state),
            queue: Mutex::new(None),
        }
    }

    /// Create a watcher that streams, resolves cameras and refreshes through `server`
    pub fn for_server(server: Arc<Server>) -> Self {
        Self::new(server.clone(), server.clone(), server)
    }

    /// Set the internal queue capacity (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Apply the queue settings from config
    pub fn with_config(self, config: &WatcherConfig) -> Self {
        self.with_queue_capacity(config.queue_capacity)
    }

    /// The subscription registry
    pub fn subscribers(&self) -> &Arc<Subscribers> {
        self.dispatcher.subscribers()
    }

    /// Bind a function callback to `kind`
    pub fn bind_callback<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribers().bind(kind, Subscriber::callback(f));
    }

    /// Bind a channel to `kind`
    pub fn bind_channel(&self, kind: EventKind, tx: mpsc::Sender<Event>) {
        self.subscribers().bind_channel(kind, tx);
    }

    /// Remove all subscribers for `kind`
    pub fn unbind(&self, kind: EventKind) {
        self.subscribers().unbind(kind);
    }

    /// Remove all subscribers
    pub fn unbind_all(&self) {
        self.subscribers().unbind_all();
    }

    /// Current supervisor state
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Whether `watch()` is active and no stop has been requested
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Watch the event stream until [`stop`](Self::stop) is called
    ///
    /// Failed connects and lost streams are retried after `retry_interval`.
    /// When `refresh_interval` is non-zero the full server state is reloaded
    /// on that period. Returns `Err(AlreadyRunning)` if this watcher is
    /// already watching. Events already queued when stop is requested are
    /// still dispatched before this returns. Dropping the returned future
    /// also stops the watcher, discarding anything queued.
    pub async fn watch(&self, retry_interval: Duration, refresh_interval: Duration) -> Result<(), WatchError> {
        let claimed = self.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });
        if !claimed {
            debug!("EventWatcher::watch: already running");
            return Err(WatchError::AlreadyRunning);
        }

        info!(
            retry_ms = retry_interval.as_millis() as u64,
            refresh_ms = refresh_interval.as_millis() as u64,
            "EventWatcher::watch: started"
        );
        self.state.send_replace(WatcherState::Connecting);

        let (queue_tx, mut queue_rx) = mpsc::channel(self.queue_capacity);
        *self.queue.lock().unwrap_or_else(PoisonError::into_inner) = Some(queue_tx.clone());

        let reader = Reader {
            transport: Arc::clone(&self.transport),
            queue: queue_tx.clone(),
            running: self.running.subscribe(),
            state: Arc::clone(&self.state),
            retry_interval,
        };
        let mut guard = WatchGuard {
            watcher: self,
            reader: Some(tokio::spawn(reader.run())),
            refresh: None,
        };

        let mut ticker = refresh_ticker(refresh_interval);
        let mut stop = self.running.subscribe();

        loop {
            tokio::select! {
                _ = stop.wait_for(|running| !*running) => {
                    debug!("EventWatcher::watch: stop requested");
                    break;
                }
                _ = next_tick(&mut ticker) => {
                    guard.start_refresh(&queue_tx);
                }
                item = queue_rx.recv() => match item {
                    Some(item) => self.dispatch_item(item),
                    None => break,
                },
            }
        }

        self.state.send_replace(WatcherState::Stopping);
        self.running.send_replace(false);
        *self.queue.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(refresh) = guard.refresh.take() {
            refresh.abort();
        }
        drop(queue_tx);

        // Deliver what was already read or injected. Ends once the reader
        // and any in-flight inject have released their senders.
        let mut drained = 0usize;
        while let Some(item) = queue_rx.recv().await {
            self.dispatch_item(item);
            drained += 1;
        }
        debug!(drained, "EventWatcher::watch: queue drained");

        if let Some(reader) = guard.reader.take() {
            if let Err(e) = reader.await {
                warn!(error = %e, "EventWatcher::watch: reader task failed");
            }
        }

        info!("EventWatcher::watch: stopped");
        Ok(())
    }

    /// Request the watcher to stop; no-op if it is not running
    ///
    /// `watch()` returns once the connection is closed and its tasks exit.
    pub fn stop(&self) {
        let stopped = self.running.send_if_modified(|running| {
            if *running {
                *running = false;
                true
            } else {
                false
            }
        });
        if stopped {
            info!("EventWatcher::stop: stopping");
            self.state.send_replace(WatcherState::Stopping);
        } else {
            debug!("EventWatcher::stop: not running");
        }
    }

    fn dispatch_item(&self, item: QueueItem) {
        match item {
            QueueItem::Record(raw) => {
                self.dispatcher.dispatch(parse_event(&raw, self.cameras.as_ref()));
            }
            QueueItem::Event(event) => {
                self.dispatcher.dispatch(event);
            }
        }
    }

    /// Deliver an application-defined `Custom` event to subscribers
    ///
    /// While watching, the event is queued behind stream events; otherwise it
    /// is dispatched directly. The camera is resolved through the registry
    /// and left empty if the number is unknown.
    pub async fn inject_custom_event(&self, camera_number: Option<u32>, message: impl Into<String>) {
        let camera = camera_number.and_then(|number| self.cameras.camera(number));
        let event = Event::synthetic(EventKind::Custom, camera, message);
        debug!(?camera_number, message = %event.message, "EventWatcher::inject_custom_event: called");

        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(queue) = queue else {
            self.dispatcher.dispatch(event);
            return;
        };
        if let Err(mpsc::error::SendError(QueueItem::Event(event))) = queue.send(QueueItem::Event(event)).await {
            // Watcher stopped while we were queueing
            self.dispatcher.dispatch(event);
        }
    }
}

/// Tears down a watch session on every exit path, including cancellation
struct WatchGuard<'a> {
    watcher: &'a EventWatcher,
    reader: Option<JoinHandle<()>>,
    refresh: Option<JoinHandle<()>>,
}

impl WatchGuard<'_> {
    /// Spawn a refresh unless the previous one is still running
    fn start_refresh(&mut self, queue: &mpsc::Sender<QueueItem>) {
        if self.refresh.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("WatchGuard::start_refresh: previous refresh still running, skipping");
            return;
        }

        let refresher = Arc::clone(&self.watcher.refresher);
        let queue = queue.clone();
        self.refresh = Some(tokio::spawn(async move {
            debug!("refresh: started");
            let event = match refresher.refresh().await {
                Ok(()) => Event::synthetic(EventKind::Refreshed, None, "server state refreshed"),
                Err(e) => {
                    warn!(error = %e, "refresh: failed");
                    Event::synthetic(EventKind::RefreshFailed, None, e.to_string())
                }
            };
            let _ = queue.send(QueueItem::Event(event)).await;
        }));
    }
}

impl Drop for WatchGuard<'_> {
    fn drop(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
        if let Some(reader) = self.reader.take() {
            // Only reached when watch() was cancelled mid-flight
            reader.abort();
        }
        self.watcher.running.send_replace(false);
        *self.watcher.queue.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.watcher.state.send_replace(WatcherState::Idle);
    }
}

fn refresh_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending().await,
    }
}
