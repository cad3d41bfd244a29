// src/storage/cluster_client.rs
//! Client for the content-addressed storage cluster.
//!
//! Two API endpoints are configured (primary and fallback) plus one public
//! read gateway. A timeout-bounded health probe tries the primary then the
//! fallback. **Mutating calls (`add`, `pin`, `unpin`, `recover`) always
//! target the primary**: retrying a failed write against the fallback
//! could duplicate content when the primary partially applied it, so
//! there is no write failover.
//!
//! When basic-auth credentials are configured, a JWT is obtained lazily
//! through the cluster's token exchange and attached as a bearer header.

use crate::config::ClusterConfig;
use crate::errors::StorageError;
use log::{debug, warn};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;

/// Options for placing content in the cluster, mapped onto
/// `/add?local&format&stream-channels`.
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub filename: String,
    /// Pin only on the receiving peer instead of allocating cluster-wide.
    pub local: bool,
    /// Serialization format hint passed through to the cluster.
    pub format: Option<String>,
    pub stream_channels: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        AddOptions {
            filename: "blob".to_string(),
            local: false,
            format: None,
            stream_channels: false,
        }
    }
}

/// Result of a successful `add`: the content address and its public
/// gateway URL.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct AddResult {
    pub content_address: String,
    pub url: String,
}

/// Storage-cluster REST client. Share via `Arc`; the lazily obtained auth
/// token is the only mutable state.
pub struct ClusterClient {
    http: reqwest::Client,
    config: ClusterConfig,
    auth_token: RwLock<Option<String>>,
}

#[allow(dead_code)]
impl ClusterClient {
    pub fn new(config: ClusterConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(ClusterClient {
            http,
            config,
            auth_token: RwLock::new(None),
        })
    }

    /// Public read URL for a content address.
    pub fn gateway_url(&self, content_address: &str) -> String {
        format!(
            "{}/ipfs/{}",
            self.config.public_gateway.trim_end_matches('/'),
            content_address
        )
    }

    pub fn public_gateway(&self) -> &str {
        &self.config.public_gateway
    }

    /// Bearer token for authenticated clusters, exchanged lazily from the
    /// configured basic-auth credentials. Absent credentials or a failed
    /// exchange yield `None` and the call proceeds unauthenticated.
    async fn bearer(&self) -> Option<String> {
        let (username, password) = match (&self.config.username, &self.config.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => return None,
        };

        if let Some(token) = self.auth_token.read().await.clone() {
            return Some(token);
        }

        let url = format!("{}/token", self.config.primary_api);
        let credentials = base64::encode(format!("{}:{}", username, password));
        let exchanged = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
            .send()
            .await;

        match exchanged {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => {
                    let token = body.get("token").and_then(Value::as_str).map(str::to_string);
                    if let Some(token) = &token {
                        *self.auth_token.write().await = Some(token.clone());
                    }
                    token
                }
                Err(e) => {
                    warn!("cluster token exchange returned unreadable body: {}", e);
                    None
                }
            },
            Ok(resp) => {
                warn!("cluster token exchange answered {}", resp.status());
                None
            }
            Err(e) => {
                warn!("cluster token exchange failed: {}", e);
                None
            }
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder, token: Option<String>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Uploads bytes to the cluster.
    ///
    /// Goes to the primary endpoint only; a failure here is not retried
    /// against the fallback.
    ///
    /// # Returns
    /// The content address the cluster assigned, plus its public gateway
    /// URL.
    ///
    /// # Errors
    /// [`StorageError::Upload`] on a non-2xx answer,
    /// [`StorageError::MissingContentAddress`] when the cluster accepted
    /// the upload but reported no CID.
    pub async fn add(&self, bytes: Vec<u8>, options: AddOptions) -> Result<AddResult, StorageError> {
        let mut query: Vec<(&str, String)> = vec![
            ("local", options.local.to_string()),
            ("stream-channels", options.stream_channels.to_string()),
        ];
        if let Some(format) = &options.format {
            query.push(("format", format.clone()));
        }

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(options.filename.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let token = self.bearer().await;
        let resp = self
            .with_auth(
                self.http
                    .post(format!("{}/add", self.config.primary_api))
                    .query(&query),
                token,
            )
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Upload(format!(
                "cluster answered {}: {}",
                status, body
            )));
        }

        let body: Value = resp.json().await?;
        let content_address = Self::extract_cid(&body)
            .ok_or_else(|| StorageError::MissingContentAddress(options.filename.clone()))?;
        let url = self.gateway_url(&content_address);
        debug!("added '{}' as {}", options.filename, content_address);
        Ok(AddResult {
            content_address,
            url,
        })
    }

    /// The cluster reports the CID either as a plain string or as an
    /// IPLD-style `{"/": "Qm..."}` link, and either as a single object or
    /// a one-element array.
    fn extract_cid(body: &Value) -> Option<String> {
        let entry = match body {
            Value::Array(items) => items.first()?,
            other => other,
        };
        match entry.get("cid")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(link) => link.get("/").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    /// Pins a content address. `true` only on a 2xx answer.
    pub async fn pin(&self, content_address: &str) -> bool {
        self.pin_request(reqwest::Method::POST, content_address, "")
            .await
    }

    /// Removes a pin. `true` only on a 2xx answer.
    pub async fn unpin(&self, content_address: &str) -> bool {
        self.pin_request(reqwest::Method::DELETE, content_address, "")
            .await
    }

    /// Asks the cluster to re-track a degraded pin.
    pub async fn recover(&self, content_address: &str) -> bool {
        self.pin_request(reqwest::Method::POST, content_address, "/recover")
            .await
    }

    async fn pin_request(&self, method: reqwest::Method, content_address: &str, suffix: &str) -> bool {
        let url = format!(
            "{}/pins/{}{}",
            self.config.primary_api, content_address, suffix
        );
        let token = self.bearer().await;
        match self.with_auth(self.http.request(method, &url), token).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("pin request against {} failed: {}", url, e);
                false
            }
        }
    }

    /// Pin information for one content address, `None` when the cluster
    /// does not track it.
    pub async fn status(&self, content_address: &str) -> Result<Option<Value>, StorageError> {
        let base = self.healthy_endpoint().await;
        let token = self.bearer().await;
        let resp = self
            .with_auth(
                self.http
                    .get(format!("{}/pins/{}", base, content_address)),
                token,
            )
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(StorageError::BadResponse(format!(
                "pin status answered {}",
                resp.status()
            )));
        }
        Ok(Some(resp.json().await?))
    }

    /// All tracked pins. Introspection only.
    pub async fn list(&self) -> Result<Value, StorageError> {
        self.introspect("/pins").await
    }

    /// Peer allocations, cluster-wide or for one content address.
    pub async fn allocations(&self, content_address: Option<&str>) -> Result<Value, StorageError> {
        match content_address {
            Some(cid) => self.introspect(&format!("/allocations/{}", cid)).await,
            None => self.introspect("/allocations").await,
        }
    }

    pub async fn peers(&self) -> Result<Value, StorageError> {
        self.introspect("/peers").await
    }

    pub async fn health_alerts(&self) -> Result<Value, StorageError> {
        self.introspect("/health/alerts").await
    }

    /// Cluster identity and version, combined for health endpoints.
    pub async fn info(&self) -> Result<Value, StorageError> {
        let id = self.introspect("/id").await?;
        let version = self.introspect("/version").await?;
        Ok(json!({ "id": id, "version": version }))
    }

    async fn introspect(&self, path: &str) -> Result<Value, StorageError> {
        let base = self.healthy_endpoint().await;
        let token = self.bearer().await;
        let resp = self
            .with_auth(self.http.get(format!("{}{}", base, path)), token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StorageError::BadResponse(format!(
                "cluster introspection {} answered {}",
                path,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    /// Resolves the endpoint used for reads: a short probe against the
    /// primary's `/id`, falling back to the fallback endpoint. Mutating
    /// calls never use this.
    pub async fn healthy_endpoint(&self) -> String {
        let timeout = Duration::from_secs(self.config.health_timeout_secs);
        for base in [&self.config.primary_api, &self.config.fallback_api] {
            let probe = self
                .http
                .get(format!("{}/id", base))
                .timeout(timeout)
                .send()
                .await;
            match probe {
                Ok(resp) if resp.status().is_success() => return base.clone(),
                Ok(resp) => debug!("endpoint {} probe answered {}", base, resp.status()),
                Err(e) => debug!("endpoint {} probe failed: {}", base, e),
            }
        }
        warn!("no healthy cluster endpoint, defaulting to primary");
        self.config.primary_api.clone()
    }
}
