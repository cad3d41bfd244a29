// src/services/signature_service.rs
//! Signing-authority signature lifecycle.
//!
//! Mirrors the certificate flow minus PDF generation: a content
//! reference is persisted or validated, then the analogous chaincode
//! method is invoked. Activation goes through the chaincode's dedicated
//! `SetActiveSignature` transition, which deactivates every signature
//! and activates the requested one inside a single ledger transaction;
//! deactivation reuses the ordinary update path.

use crate::errors::{CleanupWarning, ServiceError};
use crate::ledger::GatewayClient;
use crate::models::signature::{Signature, SignatureResponse, SignatureUpdate};
use crate::models::timestamp_rfc3339;
use crate::services::saga::Saga;
use crate::storage::BlobStore;
use log::debug;
use std::sync::Arc;

pub struct SignatureService {
    gateway: Arc<GatewayClient>,
    blobs: Arc<BlobStore>,
    signer_org: String,
}

#[allow(dead_code)]
impl SignatureService {
    pub fn new(gateway: Arc<GatewayClient>, blobs: Arc<BlobStore>, signer_org: String) -> Self {
        SignatureService {
            gateway,
            blobs,
            signer_org,
        }
    }

    fn authorize(&self, caller_org: &str) -> Result<(), ServiceError> {
        if caller_org == self.signer_org {
            Ok(())
        } else {
            Err(ServiceError::AccessDenied(format!(
                "organization '{}' may not manage signatures",
                caller_org
            )))
        }
    }

    /// Registers a signature. Either uploaded image bytes (persisted to
    /// the blob store) or an existing content reference must be supplied.
    /// New signatures start inactive.
    pub async fn create(
        &self,
        caller_org: &str,
        token: &str,
        image: Option<Vec<u8>>,
        content_reference: Option<String>,
    ) -> Result<SignatureResponse, ServiceError> {
        self.authorize(caller_org)?;

        let mut saga = Saga::new("create-signature");
        let content_reference = match image.filter(|b| !b.is_empty()) {
            Some(bytes) => {
                let filename = self.blobs.save_signature(&bytes).await?;
                saga.retain("persist-signature-image", filename.clone());
                filename
            }
            None => content_reference
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    ServiceError::Validation(
                        "signature image or content reference is required".to_string(),
                    )
                })?,
        };

        let now = timestamp_rfc3339();
        let record = Signature {
            id: Signature::new_id(),
            content_reference,
            is_active: false,
            owner: caller_org.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        let payload = match serde_json::to_string(&record) {
            Ok(p) => p,
            Err(e) => {
                let orphaned = saga.abort().await;
                return Err(ServiceError::Ledger {
                    message: format!("record serialization failed: {}", e),
                    orphaned,
                });
            }
        };

        match self
            .gateway
            .invoke(
                caller_org,
                token,
                "CreateSignature",
                &[payload],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await
        {
            Ok(confirmed) => {
                saga.commit();
                let record = serde_json::from_value(confirmed).unwrap_or(record);
                Ok(SignatureResponse::from_record(record))
            }
            Err(e) => {
                let orphaned = saga.abort().await;
                Err(ServiceError::ledger(e, orphaned))
            }
        }
    }

    /// Applies a partial update to an existing signature record.
    pub async fn update(
        &self,
        caller_org: &str,
        token: &str,
        id: &str,
        update: SignatureUpdate,
    ) -> Result<SignatureResponse, ServiceError> {
        self.authorize(caller_org)?;

        let mut merged = self.fetch(caller_org, token, id).await?;
        if let Some(reference) = &update.content_reference {
            merged.content_reference = reference.clone();
        }
        if let Some(active) = update.is_active {
            merged.is_active = active;
        }
        merged.updated_at = timestamp_rfc3339();

        let payload = serde_json::to_string(&merged).map_err(|e| ServiceError::Ledger {
            message: format!("record serialization failed: {}", e),
            orphaned: Vec::new(),
        })?;
        let confirmed = self
            .gateway
            .invoke(
                caller_org,
                token,
                "UpdateSignature",
                &[payload],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        let record = serde_json::from_value(confirmed).unwrap_or(merged);
        Ok(SignatureResponse::from_record(record))
    }

    /// Removes a signature record. Blob cleanup is opportunistic; only
    /// the ledger call decides the outcome.
    pub async fn delete(&self, caller_org: &str, token: &str, id: &str) -> Result<(), ServiceError> {
        self.authorize(caller_org)?;

        match self.fetch(caller_org, token, id).await {
            Ok(record) => {
                let reference = &record.content_reference;
                if !reference.starts_with("http")
                    && !reference.is_empty()
                    && !self.blobs.delete_signature(reference).await
                {
                    CleanupWarning {
                        operation: "delete-signature",
                        target: reference.clone(),
                        reason: "signature image could not be deleted".to_string(),
                    }
                    .emit();
                }
            }
            Err(e) => debug!("no cleanup context for signature '{}': {}", id, e),
        }

        self.gateway
            .invoke(
                caller_org,
                token,
                "DeleteSignature",
                &[id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        Ok(())
    }

    /// Makes `id` the one active signature. The chaincode performs the
    /// deactivate-all-then-activate-one transition atomically.
    pub async fn set_active(
        &self,
        caller_org: &str,
        token: &str,
        id: &str,
    ) -> Result<(), ServiceError> {
        self.authorize(caller_org)?;
        self.gateway
            .invoke(
                caller_org,
                token,
                "SetActiveSignature",
                &[id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        Ok(())
    }

    /// Deactivates one signature through the ordinary update path.
    pub async fn deactivate(
        &self,
        caller_org: &str,
        token: &str,
        id: &str,
    ) -> Result<SignatureResponse, ServiceError> {
        self.update(
            caller_org,
            token,
            id,
            SignatureUpdate {
                content_reference: None,
                is_active: Some(false),
            },
        )
        .await
    }

    pub async fn get(
        &self,
        org: &str,
        token: &str,
        id: &str,
    ) -> Result<SignatureResponse, ServiceError> {
        let record = self.fetch(org, token, id).await?;
        Ok(SignatureResponse::from_record(record))
    }

    pub async fn get_all(
        &self,
        org: &str,
        token: &str,
    ) -> Result<Vec<SignatureResponse>, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "GetAllSignatures",
                &[],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let records: Vec<Signature> =
            serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
                message: format!("malformed signature listing: {}", e),
                orphaned: Vec::new(),
            })?;
        Ok(records
            .into_iter()
            .map(SignatureResponse::from_record)
            .collect())
    }

    /// The signature currently embedded into new certificates, if any.
    pub async fn active(
        &self,
        org: &str,
        token: &str,
    ) -> Result<Option<SignatureResponse>, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "GetActiveSignature",
                &[],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let record: Signature = serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
            message: format!("malformed active-signature record: {}", e),
            orphaned: Vec::new(),
        })?;
        Ok(Some(SignatureResponse::from_record(record)))
    }

    async fn fetch(&self, org: &str, token: &str, id: &str) -> Result<Signature, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "ReadSignature",
                &[id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Err(ServiceError::NotFound(format!("signature '{}'", id)));
        }
        serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
            message: format!("malformed signature record: {}", e),
            orphaned: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LedgerConfig, OrgConfig};
    use mockito::Matcher;
    use serde_json::json;

    fn gateway(prefix: &str) -> Arc<GatewayClient> {
        Arc::new(GatewayClient::new(LedgerConfig {
            organizations: vec![OrgConfig {
                name: "rektor".to_string(),
                gateway_url: format!("{}{}", mockito::server_url(), prefix),
                admin_username: "admin".to_string(),
                admin_secret: "adminpw".to_string(),
            }],
            issuer_org: "akademik".to_string(),
            signer_org: "rektor".to_string(),
            channel: "ijazah-channel".to_string(),
            contract: "ijazah-contract".to_string(),
            token_ttl_secs: 3600,
        }))
    }

    fn service(prefix: &str, root: &std::path::Path) -> SignatureService {
        SignatureService::new(
            gateway(prefix),
            Arc::new(BlobStore::new(root).unwrap()),
            "rektor".to_string(),
        )
    }

    fn png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(16, 16));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn create_persists_image_and_invokes_chaincode() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss1", dir.path());

        let m = mockito::mock("POST", "/ss1/invoke/ijazah-channel/ijazah-contract")
            .match_body(Matcher::PartialJson(json!({"method": "CreateSignature"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":{}}"#)
            .create();

        let resp = svc
            .create("rektor", "tok", Some(png()), None)
            .await
            .unwrap();
        assert!(resp.signature.id.starts_with("signature_"));
        assert!(!resp.signature.is_active);
        assert!(resp.content_url.starts_with("/api/files/signatures/signature_"));
        assert!(svc.blobs.signature_exists(&resp.signature.content_reference).await);
        m.assert();
    }

    #[tokio::test]
    async fn create_without_image_or_reference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss2", dir.path());
        let err = svc.create("rektor", "tok", None, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_org_is_denied_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss3", dir.path());
        let err = svc
            .create("akademik", "tok", Some(png()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn set_active_invokes_dedicated_transition() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss4", dir.path());

        let m = mockito::mock("POST", "/ss4/invoke/ijazah-channel/ijazah-contract")
            .match_body(Matcher::PartialJson(json!({
                "method": "SetActiveSignature",
                "args": ["signature_1"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"ok"}"#)
            .create();

        svc.set_active("rektor", "tok", "signature_1").await.unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn deactivate_routes_through_update_path() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss5", dir.path());

        let existing = json!({
            "id": "signature_1",
            "contentReference": "signature_1.png",
            "isActive": true,
            "owner": "rektor",
            "createdAt": "2023-07-22T08:00:00+00:00",
            "updatedAt": "2023-07-22T08:00:00+00:00"
        });
        let _read = mockito::mock("POST", "/ss5/query/ijazah-channel/ijazah-contract")
            .match_body(Matcher::PartialJson(json!({"method": "ReadSignature"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "response": existing }).to_string())
            .create();
        let update = mockito::mock("POST", "/ss5/invoke/ijazah-channel/ijazah-contract")
            .match_body(Matcher::PartialJson(json!({"method": "UpdateSignature"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":{}}"#)
            .create();

        let resp = svc.deactivate("rektor", "tok", "signature_1").await.unwrap();
        assert!(!resp.signature.is_active);
        assert_eq!(resp.signature.content_reference, "signature_1.png");
        update.assert();
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service("/ss6", dir.path());

        let _read = mockito::mock("POST", "/ss6/query/ijazah-channel/ijazah-contract")
            .match_body(Matcher::PartialJson(json!({"method": "ReadSignature"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":null}"#)
            .create();

        let err = svc
            .update("rektor", "tok", "signature_x", SignatureUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
