//! Event pipeline for the server's live event stream
//!
//! Raw bytes from the stream are framed into records, parsed into
//! [`Event`]s and fanned out to the subscribers bound for their kind.
//!
//! # Architecture
//!
//! ```text
//!   HTTP body (byte chunks)
//!          │
//!          ▼
//!   ┌─────────────┐   records    ┌─────────────┐   Event   ┌─────────────┐
//!   │ LineFramer  │ ───────────▶ │ parse_event │ ────────▶ │ Dispatcher  │
//!   │  (split \r) │              │ (never fails)│          │             │
//!   └─────────────┘              └─────────────┘           └──────┬──────┘
//!                                                                 │ targets(kind)
//!                                                          ┌──────▼──────┐
//!                                                          │ Subscribers │
//!                                                          │ kind → [..] │
//!                                                          └──────┬──────┘
//!                                    one task per delivery ┌──────┴──────┐
//!                                                          ▼             ▼
//!                                                      Callback       Channel
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use spywatch::events::{Dispatcher, EventKind, Subscribers, parse_event};
//! use std::sync::Arc;
//!
//! let subs = Arc::new(Subscribers::new());
//! subs.bind_callback(EventKind::Motion, |event| println!("motion: {}", event));
//!
//! let dispatcher = Dispatcher::new(subs);
//! let event = parse_event("20190113141131 100525 CAM0 MOTION", &cameras);
//! dispatcher.dispatch(event);
//! ```

mod dispatch;
mod framer;
mod kind;
mod parser;
mod registry;
mod types;

pub use dispatch::Dispatcher;
pub use framer::{LineFramer, MAX_RECORD_LEN, RECORD_TERMINATOR, RecordTooLong, records};
pub use kind::EventKind;
pub use parser::{CAMERA_PREFIX, TIMESTAMP_FORMAT, parse_event, parse_timestamp};
pub use registry::{Callback, Subscriber, Subscribers};
pub use types::{Camera, Event, NO_SEQUENCE_ID, ParseError};
