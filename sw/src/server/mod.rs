//! Server collaborators consumed by the event watcher
//!
//! The watcher needs three things from the outside world, each behind a
//! trait so tests and embedders can supply their own:
//!
//! - [`Transport`] opens the streaming GET for the event stream
//! - [`CameraLookup`] resolves `CAMn` tokens to cameras
//! - [`Refresh`] reloads the full server state on a timer
//!
//! [`Server`] implements all three over reqwest.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

mod client;
mod error;
pub mod xml;

pub use client::{SYSTEM_INFO_PATH, Server};
pub use error::ServerError;

use crate::events::Camera;

/// Response body as a stream of byte chunks with arbitrary boundaries
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ServerError>> + Send>>;

/// Issues streaming GET requests against the server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open `path` with the given query parameters and return the body stream
    ///
    /// No timeout applies; the stream may stay open indefinitely. Dropping
    /// the returned stream closes the connection.
    async fn get_stream(&self, path: &str, params: &[(&str, &str)]) -> Result<ByteStream, ServerError>;
}

/// Resolves camera numbers to the cameras currently known
pub trait CameraLookup: Send + Sync {
    /// The camera with `number`, or `None` if it does not exist right now
    fn camera(&self, number: u32) -> Option<Camera>;
}

impl<F> CameraLookup for F
where
    F: Fn(u32) -> Option<Camera> + Send + Sync,
{
    fn camera(&self, number: u32) -> Option<Camera> {
        self(number)
    }
}

/// Reloads the full server state
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> Result<(), ServerError>;
}
