//! Immich API access.
//!
//! [`ImmichSource`] is the seam the scheduler polls through. [`ImmichClient`]
//! implements it over HTTP; [`mock::MockSource`] implements it in memory for
//! tests.

pub mod mock;
mod model;

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub use model::{JobQueue, QueueStatus, ServerJobs, ServerStatistics, ServerStorage, UserUsage};

pub const STORAGE_PATH: &str = "/api/server/storage";
pub const STATISTICS_PATH: &str = "/api/server/statistics";
pub const JOBS_PATH: &str = "/api/jobs";

const API_KEY_HEADER: &str = "x-api-key";

/// Failure to obtain one resource from the Immich API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body transfer failure.
    #[error("GET {path} failed: {source}")]
    Request {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {path} returned HTTP {status}")]
    Status { path: &'static str, status: u16 },

    /// Body is not JSON or does not match the expected record.
    #[error("GET {path} returned an unexpected body: {source}")]
    Parse {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The HTTP client could not be constructed (TLS backend, invalid settings).
#[derive(Debug, Error)]
#[error("cannot build HTTP client: {0}")]
pub struct ClientError(#[from] reqwest::Error);

impl FetchError {
    pub fn path(&self) -> &'static str {
        match self {
            FetchError::Request { path, .. }
            | FetchError::Status { path, .. }
            | FetchError::Parse { path, .. } => path,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse { .. })
    }
}

/// Async data source for the three polled resources.
pub trait ImmichSource: Send + Sync + 'static {
    fn server_storage(&self) -> impl Future<Output = Result<ServerStorage, FetchError>> + Send;

    fn server_statistics(
        &self,
    ) -> impl Future<Output = Result<ServerStatistics, FetchError>> + Send;

    fn jobs(&self) -> impl Future<Output = Result<ServerJobs, FetchError>> + Send;
}

/// Normalizes a configured host into a base URL: adds `http://` when no
/// scheme is given and strips trailing slashes.
pub fn normalize_base_url(host: &str) -> String {
    let host = host.trim();
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    };
    with_scheme.trim_end_matches('/').to_owned()
}

/// HTTP client for the Immich server API, authenticated with an API key.
#[derive(Debug, Clone)]
pub struct ImmichClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ImmichClient {
    pub fn new(host: &str, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("immich-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(host),
            api_key: api_key.to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, FetchError> {
        let response = self
            .http
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|source| FetchError::Request { path, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request { path, source })?;
        debug!(path, bytes = body.len(), "fetched");

        serde_json::from_slice(&body).map_err(|source| FetchError::Parse { path, source })
    }
}

impl ImmichSource for ImmichClient {
    async fn server_storage(&self) -> Result<ServerStorage, FetchError> {
        self.get_json(STORAGE_PATH).await
    }

    async fn server_statistics(&self) -> Result<ServerStatistics, FetchError> {
        self.get_json(STATISTICS_PATH).await
    }

    async fn jobs(&self) -> Result<ServerJobs, FetchError> {
        self.get_json(JOBS_PATH).await
    }
}
