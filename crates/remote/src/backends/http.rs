//! HTTP worker backend client.

use crate::error::{BackendError, BackendResult};
use crate::traits::{BackendConnector, ContainerSpec, VolumeSpec, WorkerBackend};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct CreateResponse {
    handle: String,
}

/// HTTP client for a single worker's backend.
#[derive(Clone, Debug)]
pub struct HttpWorkerBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpWorkerBackend {
    /// Build a client for the given worker address. Addresses registered
    /// without a scheme ("10.0.0.7:7788") are assumed to be plain HTTP.
    pub fn new(addr: &str, timeout: Duration) -> BackendResult<Self> {
        let base = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };
        let base_url = Url::parse(&base)
            .map_err(|e| BackendError::InvalidAddress(format!("{addr}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidAddress(format!("{path}: {e}")))
    }

    async fn post_create<T: Serialize>(&self, path: &str, spec: &T) -> BackendResult<String> {
        let url = self.url(path)?;
        let response = self
            .http
            .post(url)
            .json(spec)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Remote {
                status: status.as_u16(),
                detail,
            });
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        Ok(created.handle)
    }

    async fn delete(&self, path: &str) -> BackendResult<()> {
        let url = self.url(path)?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        // Idempotent delete: a handle already gone on the remote side is
        // success for the caller.
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(path, "remote resource already absent");
            return Ok(());
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Remote {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(())
    }
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Unreachable(err.to_string())
}

#[async_trait]
impl WorkerBackend for HttpWorkerBackend {
    async fn create_container(&self, spec: &ContainerSpec) -> BackendResult<String> {
        self.post_create("containers", spec).await
    }

    async fn destroy_container(&self, handle: &str) -> BackendResult<()> {
        self.delete(&format!("containers/{handle}")).await
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> BackendResult<String> {
        self.post_create("volumes", spec).await
    }

    async fn destroy_volume(&self, handle: &str) -> BackendResult<()> {
        self.delete(&format!("volumes/{handle}")).await
    }
}

/// Connector producing `HttpWorkerBackend` clients with a shared timeout.
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl BackendConnector for HttpConnector {
    fn connect(&self, addr: &str) -> BackendResult<Arc<dyn WorkerBackend>> {
        Ok(Arc::new(HttpWorkerBackend::new(addr, self.timeout)?))
    }
}
