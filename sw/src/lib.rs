//! SpyWatch - self-healing event stream watcher for SecuritySpy servers
//!
//! SpyWatch holds a long-lived connection to a SecuritySpy server's
//! `++eventStream` endpoint, turns each text record into a typed [`Event`]
//! and fans it out to the callbacks and channels bound for its kind. Lost
//! connections are retried forever until the watcher is stopped.
//!
//! # Modules
//!
//! - [`events`] - framing, parsing, subscription registry and dispatch
//! - [`server`] - transport, camera lookup and refresh collaborators
//! - [`watcher`] - the stream supervisor
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use spywatch::{EventKind, EventWatcher, Server, ServerConfig};
//!
//! let server = Arc::new(Server::from_config(&ServerConfig::default())?);
//! let watcher = Arc::new(EventWatcher::for_server(server));
//! watcher.bind_callback(EventKind::Motion, |event| println!("{}", event));
//! watcher.watch(Duration::from_secs(10), Duration::from_secs(300)).await?;
//! ```

pub mod cli;
pub mod config;
pub mod events;
pub mod server;
pub mod watcher;

pub use config::{Config, ServerConfig, WatcherConfig};
pub use events::{
    Callback, Camera, Dispatcher, Event, EventKind, LineFramer, ParseError, Subscriber, Subscribers, parse_event,
};
pub use server::{ByteStream, CameraLookup, Refresh, Server, ServerError, Transport};
pub use watcher::{EventWatcher, WatchError, WatcherState};
