//! Stream supervisor
//!
//! [`EventWatcher`] keeps one event stream connection alive, reconnecting on
//! any failure, and turns every record into a dispatched [`Event`].
//!
//! ```text
//!   Transport ──bytes──► Reader task ──records──►┐
//!                          (framer)              │ bounded queue
//!   refresh timer ──Refreshed/RefreshFailed────►─┤
//!   inject_custom_event ──Custom───────────────►─┘
//!                                                ▼
//!                                  watch() loop: parse → Dispatcher
//! ```
//!
//! [`Event`]: crate::events::Event

mod event_watcher;
mod reader;
mod state;

pub use event_watcher::{DEFAULT_QUEUE_CAPACITY, EventWatcher};
pub use reader::{EVENT_STREAM_PARAMS, EVENT_STREAM_PATH};
pub use state::{WatchError, WatcherState};
