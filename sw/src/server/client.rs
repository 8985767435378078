//! reqwest-backed server client
//!
//! One HTTP client serves both the long-lived event stream and the periodic
//! refresh. The client has no global timeout so the stream can stay open
//! indefinitely; the refresh request sets its own.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use super::xml::parse_cameras;
use super::{ByteStream, CameraLookup, Refresh, ServerError, Transport};
use crate::config::ServerConfig;
use crate::events::Camera;

/// Status document listing the server's cameras
pub const SYSTEM_INFO_PATH: &str = "++systemInfo";

/// SecuritySpy server client
pub struct Server {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: Client,
    refresh_timeout: Duration,
    cameras: RwLock<BTreeMap<u32, Camera>>,
}

impl Server {
    /// Create a new client from configuration
    ///
    /// Reads the password from the environment variable named in config.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        debug!(url = %config.url, verify_ssl = config.verify_ssl, "Server::from_config: called");

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(ServerError::Network)?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.get_password(),
            http,
            refresh_timeout: config.refresh_timeout(),
            cameras: RwLock::new(BTreeMap::new()),
        })
    }

    /// Server base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Snapshot of the cached cameras, ordered by number
    pub fn cameras(&self) -> Vec<Camera> {
        self.cameras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Replace the cached camera list
    pub fn set_cameras(&self, cameras: Vec<Camera>) {
        let map: BTreeMap<u32, Camera> = cameras.into_iter().map(|c| (c.number, c)).collect();
        debug!(count = map.len(), "Server::set_cameras: called");
        *self.cameras.write().unwrap_or_else(PoisonError::into_inner) = map;
    }

    /// Fetch the raw `++systemInfo` XML document
    pub async fn system_info(&self) -> Result<String, ServerError> {
        debug!("Server::system_info: called");
        let response = self
            .request(SYSTEM_INFO_PATH, &[])
            .timeout(self.refresh_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = check_status(response).await?;
        response.text().await.map_err(|e| self.map_send_error(e))
    }

    fn request(&self, path: &str, params: &[(&str, &str)]) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut builder = self.http.get(url).query(params);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        builder
    }

    fn map_send_error(&self, e: reqwest::Error) -> ServerError {
        if e.is_timeout() {
            ServerError::Timeout(self.refresh_timeout)
        } else {
            ServerError::Network(e)
        }
    }
}

/// Turn a non-success response into [`ServerError::Api`]
async fn check_status(response: Response) -> Result<Response, ServerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), "check_status: request failed");
    Err(ServerError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

#[async_trait]
impl Transport for Server {
    async fn get_stream(&self, path: &str, params: &[(&str, &str)]) -> Result<ByteStream, ServerError> {
        debug!(%path, ?params, "Server::get_stream: called");
        let response = self.request(path, params).send().await.map_err(ServerError::Network)?;
        let response = check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ServerError::Network));
        Ok(Box::pin(body))
    }
}

impl CameraLookup for Server {
    fn camera(&self, number: u32) -> Option<Camera> {
        self.cameras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&number)
            .cloned()
    }
}

#[async_trait]
impl Refresh for Server {
    async fn refresh(&self) -> Result<(), ServerError> {
        let xml = self.system_info().await?;
        if !xml.contains("<system") {
            return Err(ServerError::InvalidResponse(
                "systemInfo response is not a system document".to_string(),
            ));
        }
        let cameras = parse_cameras(&xml);
        info!(count = cameras.len(), "Server::refresh: camera list updated");
        self.set_cameras(cameras);
        Ok(())
    }
}
