// src/ledger/gateway_client.rs
//! REST client for the ledger's per-organization gateways.
//!
//! Each organization runs its own gateway exposing identity enrollment
//! (`/user/enroll`, `/user/reenroll`) and chaincode calls
//! (`/invoke/{channel}/{contract}`, `/query/{channel}/{contract}`).
//! Administrative identities are enrolled eagerly at start-up and cached
//! per organization; a failed start-up enrollment leaves the process
//! degraded rather than aborting it.
//!
//! There are no internal retries. Retry and backoff are the caller's
//! responsibility.

use crate::config::LedgerConfig;
use crate::errors::GatewayError;
use crate::ledger::token_cache::TokenCache;
use log::{error, info};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Client for the ledger gateway REST API.
///
/// Thread-safe: share via `Arc`. The admin-token cache is the only
/// mutable state and is internally synchronized.
pub struct GatewayClient {
    http: reqwest::Client,
    config: LedgerConfig,
    admin_tokens: TokenCache,
}

#[allow(dead_code)]
impl GatewayClient {
    pub fn new(config: LedgerConfig) -> Self {
        let ttl = Duration::from_secs(config.token_ttl_secs);
        GatewayClient {
            http: reqwest::Client::new(),
            config,
            admin_tokens: TokenCache::new(ttl),
        }
    }

    fn gateway_url(&self, org: &str) -> Result<&str, GatewayError> {
        self.config
            .organizations
            .iter()
            .find(|o| o.name == org)
            .map(|o| o.gateway_url.as_str())
            .ok_or_else(|| GatewayError::UnknownOrganization(org.to_string()))
    }

    /// Enrolls an identity against the organization's gateway.
    ///
    /// # Arguments
    /// * `org` - Organization whose gateway performs the enrollment
    /// * `username` - Identity to enroll
    /// * `secret` - Enrollment secret for that identity
    ///
    /// # Returns
    /// A bearer token accepted by the same organization's invoke/query
    /// endpoints.
    ///
    /// # Errors
    /// Returns [`GatewayError::Enrollment`] on bad credentials or
    /// transport failure.
    pub async fn enroll(
        &self,
        org: &str,
        username: &str,
        secret: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/user/enroll", self.gateway_url(org)?);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "id": username, "secret": secret }))
            .send()
            .await
            .map_err(|e| GatewayError::Enrollment {
                org: org.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Enrollment {
                org: org.to_string(),
                reason: format!("gateway answered {}: {}", status, body),
            });
        }

        Self::extract_token(resp.json::<Value>().await?)
    }

    /// Exchanges a still-valid token for a fresh one.
    pub async fn reenroll(&self, org: &str, token: &str) -> Result<String, GatewayError> {
        let url = format!("{}/user/reenroll", self.gateway_url(org)?);
        let resp = self.http.post(&url).bearer_auth(token).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Enrollment {
                org: org.to_string(),
                reason: format!("re-enrollment answered {}: {}", status, body),
            });
        }

        Self::extract_token(resp.json::<Value>().await?)
    }

    fn extract_token(body: Value) -> Result<String, GatewayError> {
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::BadResponse("missing 'token' field".to_string()))
    }

    /// State-changing chaincode call.
    ///
    /// # Arguments
    /// * `org` - Organization routing the call
    /// * `token` - Bearer token from enrollment
    /// * `method` - Chaincode method name (e.g. "CreateIjazah")
    /// * `args` - Positional string arguments, as the chaincode expects
    /// * `channel` / `contract` - Ledger routing coordinates
    ///
    /// # Returns
    /// The gateway's unwrapped `response` value.
    pub async fn invoke(
        &self,
        org: &str,
        token: &str,
        method: &str,
        args: &[String],
        channel: &str,
        contract: &str,
    ) -> Result<Value, GatewayError> {
        self.chaincode_call("invoke", org, token, method, args, channel, contract)
            .await
    }

    /// Read-only chaincode call. Must not mutate ledger state.
    pub async fn query(
        &self,
        org: &str,
        token: &str,
        method: &str,
        args: &[String],
        channel: &str,
        contract: &str,
    ) -> Result<Value, GatewayError> {
        self.chaincode_call("query", org, token, method, args, channel, contract)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn chaincode_call(
        &self,
        kind: &str,
        org: &str,
        token: &str,
        method: &str,
        args: &[String],
        channel: &str,
        contract: &str,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/{}/{}/{}", self.gateway_url(org)?, kind, channel, contract);
        let fail = |reason: String| -> GatewayError {
            if kind == "invoke" {
                GatewayError::Invoke {
                    method: method.to_string(),
                    reason,
                }
            } else {
                GatewayError::Query {
                    method: method.to_string(),
                    reason,
                }
            }
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "method": method, "args": args }))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("gateway answered {}: {}", status, body)));
        }

        let body: Value = resp.json().await.map_err(|e| fail(e.to_string()))?;
        body.get("response")
            .cloned()
            .ok_or_else(|| GatewayError::BadResponse("missing 'response' field".to_string()))
    }

    /// Probes a token with a harmless read-only call.
    pub async fn validate_token(&self, org: &str, token: &str) -> bool {
        self.query(
            org,
            token,
            "GetAllSignatures",
            &[],
            &self.config.channel,
            &self.config.contract,
        )
        .await
        .is_ok()
    }

    /// Eagerly enrolls one administrative identity per configured
    /// organization. Failures are logged and skipped; admin-gated calls
    /// for those organizations fail later with
    /// [`GatewayError::AdminTokenUnavailable`].
    pub async fn init_admin_tokens(&self) {
        for org in &self.config.organizations {
            match self
                .enroll(&org.name, &org.admin_username, &org.admin_secret)
                .await
            {
                Ok(token) => {
                    self.admin_tokens.store(&org.name, token).await;
                    info!("enrolled admin identity for organization '{}'", org.name);
                }
                Err(e) => {
                    error!(
                        "admin enrollment for organization '{}' failed, continuing degraded: {}",
                        org.name, e
                    );
                }
            }
        }
    }

    /// Returns the cached admin token for `org`, re-enrolling single-flight
    /// when the cached token is absent or past its TTL.
    pub async fn admin_token(&self, org: &str) -> Result<String, GatewayError> {
        if let Some(token) = self.admin_tokens.get_fresh(org).await {
            return Ok(token);
        }

        let org_config = self
            .config
            .organizations
            .iter()
            .find(|o| o.name == org)
            .ok_or_else(|| GatewayError::UnknownOrganization(org.to_string()))?
            .clone();

        let lock = self.admin_tokens.refresh_lock(org).await;
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited on the lock.
        if let Some(token) = self.admin_tokens.get_fresh(org).await {
            return Ok(token);
        }

        match self
            .enroll(org, &org_config.admin_username, &org_config.admin_secret)
            .await
        {
            Ok(token) => {
                self.admin_tokens.store(org, token.clone()).await;
                Ok(token)
            }
            Err(e) => {
                error!("admin re-enrollment for '{}' failed: {}", org, e);
                Err(GatewayError::AdminTokenUnavailable(org.to_string()))
            }
        }
    }

    /// Per-organization reachability: admin token obtainable and accepted
    /// by a harmless query.
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let mut health = HashMap::new();
        for org in &self.config.organizations {
            let healthy = match self.admin_token(&org.name).await {
                Ok(token) => self.validate_token(&org.name, &token).await,
                Err(_) => false,
            };
            health.insert(org.name.clone(), healthy);
        }
        health
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    pub fn contract(&self) -> &str {
        &self.config.contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrgConfig;

    /// Config with the org gateway rooted at a unique path prefix on the
    /// shared mock server, so parallel tests never match each other's
    /// mocks.
    fn test_config(prefix: &str) -> LedgerConfig {
        LedgerConfig {
            organizations: vec![OrgConfig {
                name: "akademik".to_string(),
                gateway_url: format!("{}{}", mockito::server_url(), prefix),
                admin_username: "admin".to_string(),
                admin_secret: "adminpw".to_string(),
            }],
            issuer_org: "akademik".to_string(),
            signer_org: "rektor".to_string(),
            channel: "ijazah-channel".to_string(),
            contract: "ijazah-contract".to_string(),
            token_ttl_secs: 3600,
        }
    }

    #[tokio::test]
    async fn enroll_returns_token() {
        let _m = mockito::mock("POST", "/ge1/user/enroll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"bearer-abc"}"#)
            .create();

        let client = GatewayClient::new(test_config("/ge1"));
        let token = client.enroll("akademik", "admin", "adminpw").await.unwrap();
        assert_eq!(token, "bearer-abc");
    }

    #[tokio::test]
    async fn enroll_rejection_is_enrollment_error() {
        let _m = mockito::mock("POST", "/ge2/user/enroll")
            .with_status(401)
            .with_body("bad credentials")
            .create();

        let client = GatewayClient::new(test_config("/ge2"));
        let err = client
            .enroll("akademik", "admin", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Enrollment { .. }));
        assert!(err.to_string().contains("akademik"));
    }

    #[tokio::test]
    async fn invoke_sends_bearer_and_unwraps_response() {
        let m = mockito::mock("POST", "/ge3/invoke/ijazah-channel/ijazah-contract")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":{"id":"ijazah_1"}}"#)
            .create();

        let client = GatewayClient::new(test_config("/ge3"));
        let value = client
            .invoke(
                "akademik",
                "tok-1",
                "CreateIjazah",
                &["{}".to_string()],
                "ijazah-channel",
                "ijazah-contract",
            )
            .await
            .unwrap();
        assert_eq!(value["id"], "ijazah_1");
        m.assert();
    }

    #[tokio::test]
    async fn query_failure_surfaces_method() {
        let _m = mockito::mock("POST", "/ge4/query/ijazah-channel/ijazah-contract")
            .with_status(500)
            .with_body("chaincode panic")
            .create();

        let client = GatewayClient::new(test_config("/ge4"));
        let err = client
            .query(
                "akademik",
                "tok-1",
                "ReadIjazah",
                &["ijazah_1".to_string()],
                "ijazah-channel",
                "ijazah-contract",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Query { .. }));
        assert!(err.to_string().contains("ReadIjazah"));
    }

    #[tokio::test]
    async fn validate_token_probes_with_query() {
        let _m = mockito::mock("POST", "/ge5/query/ijazah-channel/ijazah-contract")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":[]}"#)
            .create();

        let client = GatewayClient::new(test_config("/ge5"));
        assert!(client.validate_token("akademik", "tok-1").await);
    }

    #[tokio::test]
    async fn admin_token_degraded_when_enrollment_fails() {
        let _m = mockito::mock("POST", "/ge6/user/enroll")
            .with_status(503)
            .create();

        let client = GatewayClient::new(test_config("/ge6"));
        client.init_admin_tokens().await;
        let err = client.admin_token("akademik").await.unwrap_err();
        assert!(matches!(err, GatewayError::AdminTokenUnavailable(_)));
    }

    #[tokio::test]
    async fn admin_token_cached_after_startup_enrollment() {
        let m = mockito::mock("POST", "/ge7/user/enroll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"admin-tok"}"#)
            .expect(1)
            .create();

        let client = GatewayClient::new(test_config("/ge7"));
        client.init_admin_tokens().await;
        assert_eq!(client.admin_token("akademik").await.unwrap(), "admin-tok");
        assert_eq!(client.admin_token("akademik").await.unwrap(), "admin-tok");
        m.assert();
    }

    #[tokio::test]
    async fn unknown_org_is_rejected() {
        let client = GatewayClient::new(test_config("/ge8"));
        let err = client.enroll("nonexistent", "a", "b").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownOrganization(_)));
    }
}
