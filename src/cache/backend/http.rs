//! HTTP Key/Value Gateway Backend
//!
//! Talks to a REST key/value gateway in front of the shared cache cluster:
//!
//! - `GET    {endpoint}/{prefix}{key}`            -> 200 with body, or 404
//! - `PUT    {endpoint}/{prefix}{key}?ttl={secs}` -> 2xx
//! - `DELETE {endpoint}/{prefix}{key}`            -> 2xx or 404
//!
//! The gateway owns expiry; this adapter only forwards the TTL.

use crate::cache::backend::DistributedBackend;
use crate::cache::entry::CacheKey;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

const BACKEND_NAME: &str = "http";

/// Configuration for the HTTP backend
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Gateway base URL
    pub endpoint: String,
    /// Prefix prepended to every key
    pub key_prefix: String,
    /// Client-side request timeout
    pub timeout: Duration,
}

/// Distributed tier reached over HTTP
pub struct HttpBackend {
    base: Url,
    key_prefix: String,
    client: Client,
    closed: AtomicBool,
}

impl HttpBackend {
    /// Create a backend; fails on an unparseable endpoint
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let mut base = Url::parse(&config.endpoint).map_err(|e| {
            Error::Configuration(format!("Invalid distributed endpoint {}: {}", config.endpoint, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Distributed endpoint {} cannot be used as a base URL",
                config.endpoint
            )));
        }
        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base,
            key_prefix: config.key_prefix,
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// URL for a key
    pub fn key_url(&self, key: &CacheKey) -> Result<Url> {
        // "./" keeps a prefix containing ':' from parsing as a scheme
        self.base
            .join(&format!("./{}{}", self.key_prefix, key.to_hex()))
            .map_err(|e| Error::distributed(BACKEND_NAME, "url", e))
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::distributed(BACKEND_NAME, operation, "backend closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributedBackend for HttpBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        self.ensure_open("get")?;
        let url = self.key_url(key)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::distributed(BACKEND_NAME, "get", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Error::distributed(BACKEND_NAME, "get", e))?;
                debug!(size = body.len(), "Distributed tier hit");
                Ok(Some(body))
            }
            status => Err(Error::distributed(
                BACKEND_NAME,
                "get",
                format!("unexpected status {}", status),
            )),
        }
    }

    #[instrument(skip(self, value), fields(key = %key, size = value.len()))]
    async fn set_with_ttl(&self, key: &CacheKey, value: Bytes, ttl_secs: u64) -> Result<()> {
        self.ensure_open("set")?;
        let mut url = self.key_url(key)?;
        url.query_pairs_mut().append_pair("ttl", &ttl_secs.to_string());

        let response = self
            .client
            .put(url)
            .body(value)
            .send()
            .await
            .map_err(|e| Error::distributed(BACKEND_NAME, "set", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::distributed(
                BACKEND_NAME,
                "set",
                format!("unexpected status {}", response.status()),
            ))
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &CacheKey) -> Result<()> {
        self.ensure_open("delete")?;
        let url = self.key_url(key)?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| Error::distributed(BACKEND_NAME, "delete", e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Error::distributed(
                BACKEND_NAME,
                "delete",
                format!("unexpected status {}", status),
            ))
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
