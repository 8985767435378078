//! Subscription registry - which subscribers receive which event kinds

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::debug;

use super::kind::EventKind;
use super::types::Event;

/// Function subscriber, invoked on a blocking worker thread
pub type Callback = Arc<dyn Fn(Event) + Send + Sync>;

/// A delivery target for events
#[derive(Clone)]
pub enum Subscriber {
    Callback(Callback),
    Channel(mpsc::Sender<Event>),
}

impl Subscriber {
    /// Wrap a closure as a subscriber
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        Subscriber::Callback(Arc::new(f))
    }

    fn variant(&self) -> &'static str {
        match self {
            Subscriber::Callback(_) => "callback",
            Subscriber::Channel(_) => "channel",
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variant())
    }
}

/// Registry mapping event kinds to ordered subscriber lists
///
/// Lookups take a shared lock so dispatch can run alongside other lookups;
/// bind and unbind take the exclusive lock.
#[derive(Default)]
pub struct Subscribers {
    binds: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber for `kind`, after any already bound
    ///
    /// A channel whose receiver is already gone is ignored.
    pub fn bind(&self, kind: EventKind, subscriber: Subscriber) {
        if let Subscriber::Channel(tx) = &subscriber {
            if tx.is_closed() {
                debug!(%kind, "Subscribers::bind: channel already closed, ignoring");
                return;
            }
        }
        debug!(%kind, variant = subscriber.variant(), "Subscribers::bind: called");
        self.write().entry(kind).or_default().push(subscriber);
    }

    /// Bind a function callback to `kind`
    pub fn bind_callback<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.bind(kind, Subscriber::callback(f));
    }

    /// Bind a channel to `kind`
    pub fn bind_channel(&self, kind: EventKind, tx: mpsc::Sender<Event>) {
        self.bind(kind, Subscriber::Channel(tx));
    }

    /// Remove every subscriber for `kind`; no-op if none are bound
    pub fn unbind(&self, kind: EventKind) {
        let removed = self.write().remove(&kind).map(|v| v.len()).unwrap_or(0);
        debug!(%kind, removed, "Subscribers::unbind: called");
    }

    /// Remove every subscriber for every kind
    pub fn unbind_all(&self) {
        debug!("Subscribers::unbind_all: called");
        self.write().clear();
    }

    /// Number of subscribers bound directly to `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.read().get(&kind).map(|v| v.len()).unwrap_or(0)
    }

    /// Kinds that currently have at least one subscriber
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<_> = self.read().keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Subscribers that should receive an event of `kind`
    ///
    /// Returns the kind's own subscribers followed by the `All` subscribers,
    /// each list in bind order. Unknown-kind events reach the `Unknown`
    /// subscribers through their own kind. The lock is released on return.
    pub fn targets(&self, kind: EventKind) -> Vec<Subscriber> {
        let binds = self.read();
        let mut targets = binds.get(&kind).cloned().unwrap_or_default();
        if kind != EventKind::All {
            if let Some(all) = binds.get(&EventKind::All) {
                targets.extend(all.iter().cloned());
            }
        }
        targets
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        self.binds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        self.binds.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_bind_and_count() {
        let subs = Subscribers::new();
        subs.bind_callback(EventKind::Motion, |_| {});
        subs.bind_callback(EventKind::Motion, |_| {});
        subs.bind_callback(EventKind::Online, |_| {});

        assert_eq!(subs.count(EventKind::Motion), 2);
        assert_eq!(subs.count(EventKind::Online), 1);
        assert_eq!(subs.count(EventKind::Offline), 0);
        assert_eq!(subs.kinds(), vec![EventKind::Motion, EventKind::Online]);
    }

    #[test]
    fn test_unbind_all_bind_unbind_leaves_nothing() {
        let subs = Subscribers::new();
        subs.bind_callback(EventKind::Motion, |_| {});
        subs.unbind_all();
        subs.bind_callback(EventKind::Motion, |_| {});
        subs.unbind(EventKind::Motion);

        assert_eq!(subs.count(EventKind::Motion), 0);
        assert!(subs.kinds().is_empty());
    }

    #[test]
    fn test_unbind_missing_kind_is_noop() {
        let subs = Subscribers::new();
        subs.unbind(EventKind::Error);
        assert!(subs.kinds().is_empty());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let subs = Subscribers::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        subs.bind_channel(EventKind::Motion, tx);
        assert_eq!(subs.count(EventKind::Motion), 0);
    }

    #[test]
    fn test_targets_includes_all_after_exact() {
        let subs = Subscribers::new();
        let (tx, _rx) = mpsc::channel(1);
        subs.bind_channel(EventKind::All, tx);
        subs.bind_callback(EventKind::Motion, |_| {});

        let targets = subs.targets(EventKind::Motion);
        assert_eq!(targets.len(), 2);
        assert!(matches!(targets[0], Subscriber::Callback(_)));
        assert!(matches!(targets[1], Subscriber::Channel(_)));

        assert_eq!(subs.targets(EventKind::Online).len(), 1);
        assert_eq!(subs.targets(EventKind::All).len(), 1);
    }

    #[test]
    fn test_unknown_subscribers_only_for_unknown_events() {
        let subs = Subscribers::new();
        subs.bind_callback(EventKind::Unknown, |_| {});

        assert_eq!(subs.targets(EventKind::Unknown).len(), 1);
        assert!(subs.targets(EventKind::Motion).is_empty());
    }

    #[test]
    fn test_concurrent_bind_and_lookup() {
        let subs = Arc::new(Subscribers::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let subs = Arc::clone(&subs);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    subs.bind_callback(EventKind::Motion, |_| {});
                    let _ = subs.targets(EventKind::Motion);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(subs.count(EventKind::Motion), 800);
    }
}
