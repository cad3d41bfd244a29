// src/services/certificate_service.rs
//! Certificate lifecycle orchestration.
//!
//! Every lifecycle operation is a multi-step sequence across the ledger,
//! the storage cluster and the local blob store, with no transaction
//! spanning them. Each step commits independently; the saga records what
//! has been done so a late failure can report the artifacts left behind.
//! Compensation is deliberately asymmetric:
//!
//! - a failed pin is logged and ignored (content stays addressable),
//! - blob deletions and unpins of superseded content are best-effort,
//! - a failed ledger write leaves already-placed content in the cluster;
//!   its references travel on the returned error and are reconciled out
//!   of band.
//!
//! Once a sequence starts it runs to completion or failure; there is no
//! cancellation.

use crate::errors::{CleanupWarning, ServiceError};
use crate::ledger::GatewayClient;
use crate::models::certificate::{
    Certificate, CertificateData, CertificateResponse, CertificateStatus, CertificateUpdate,
};
use crate::models::signature::Signature;
use crate::models::timestamp_rfc3339;
use crate::pdf::CertificateRenderer;
use crate::services::roster::{self, RosterEntry};
use crate::services::saga::Saga;
use crate::storage::cluster_client::AddOptions;
use crate::storage::{BlobStore, ClusterClient};
use log::{debug, warn};
use std::sync::Arc;

pub struct CertificateService {
    gateway: Arc<GatewayClient>,
    cluster: Arc<ClusterClient>,
    blobs: Arc<BlobStore>,
    renderer: Arc<dyn CertificateRenderer>,
    issuer_org: String,
}

#[allow(dead_code)]
impl CertificateService {
    pub fn new(
        gateway: Arc<GatewayClient>,
        cluster: Arc<ClusterClient>,
        blobs: Arc<BlobStore>,
        renderer: Arc<dyn CertificateRenderer>,
        issuer_org: String,
    ) -> Self {
        CertificateService {
            gateway,
            cluster,
            blobs,
            renderer,
            issuer_org,
        }
    }

    fn authorize_issuer(&self, caller_org: &str) -> Result<(), ServiceError> {
        if caller_org == self.issuer_org {
            Ok(())
        } else {
            Err(ServiceError::AccessDenied(format!(
                "organization '{}' is not the issuing organization",
                caller_org
            )))
        }
    }

    /// Issues a certificate: photo to the blob store, rendered PDF to the
    /// cluster (pinned), record to the ledger. Validation happens before
    /// any store is touched.
    pub async fn create(
        &self,
        caller_org: &str,
        token: &str,
        data: CertificateData,
        photo: Option<Vec<u8>>,
    ) -> Result<CertificateResponse, ServiceError> {
        self.authorize_issuer(caller_org)?;

        let photo = photo
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ServiceError::Validation("certificate photo is required".to_string()))?;

        let active = self.active_signature(caller_org, token).await?;

        let mut saga = Saga::new("create-certificate");
        let photo_reference = self.blobs.save_photo(&photo).await?;
        saga.retain("persist-photo", photo_reference.clone());

        let now = timestamp_rfc3339();
        let mut record = Certificate {
            id: Certificate::new_id(),
            holder_name: data.holder_name,
            nim: data.nim,
            study_program: data.study_program,
            faculty: data.faculty,
            graduation_date: data.graduation_date,
            certificate_number: data.certificate_number,
            content_address: String::new(),
            signature_id: active.id.clone(),
            photo_reference,
            status: CertificateStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };

        let pdf = match self.render(&record, &active.content_reference).await {
            Ok(pdf) => pdf,
            Err(e) => {
                saga.abort().await;
                return Err(e);
            }
        };

        let content_address = match self.place_pdf(&record.id, pdf).await {
            Ok(cid) => cid,
            Err(e) => {
                saga.abort().await;
                return Err(e);
            }
        };
        saga.retain("upload-pdf", content_address.clone());
        record.content_address = content_address;

        self.commit_record(caller_org, token, "CreateIjazah", record, saga)
            .await
    }

    /// Updates a certificate. The prior PDF is unpinned best-effort and
    /// replaced, never mutated; an omitted photo keeps the prior
    /// photo reference.
    pub async fn update(
        &self,
        caller_org: &str,
        token: &str,
        id: &str,
        update: CertificateUpdate,
        new_photo: Option<Vec<u8>>,
    ) -> Result<CertificateResponse, ServiceError> {
        self.authorize_issuer(caller_org)?;

        let existing = self.fetch(caller_org, token, id).await?;
        let mut merged = existing.clone();
        merged.apply_update(&update);
        merged.updated_at = timestamp_rfc3339();

        let mut saga = Saga::new("update-certificate");
        if let Some(bytes) = new_photo.filter(|b| !b.is_empty()) {
            // Replacing, not mutating: the stale blob goes first, but a
            // failed deletion never blocks the update.
            if !self.blobs.delete_photo(&existing.photo_reference).await {
                CleanupWarning {
                    operation: "update-certificate",
                    target: existing.photo_reference.clone(),
                    reason: "stale photo blob could not be deleted".to_string(),
                }
                .emit();
            }
            let filename = match self.blobs.save_photo(&bytes).await {
                Ok(filename) => filename,
                Err(e) => {
                    saga.abort().await;
                    return Err(e.into());
                }
            };
            saga.retain("persist-photo", filename.clone());
            merged.photo_reference = filename;
        }

        let signature_reference = match self
            .signature_reference(caller_org, token, &merged.signature_id)
            .await
        {
            Ok(reference) => reference,
            Err(e) => {
                saga.abort().await;
                return Err(e);
            }
        };
        let pdf = match self.render(&merged, &signature_reference).await {
            Ok(pdf) => pdf,
            Err(e) => {
                saga.abort().await;
                return Err(e);
            }
        };

        if !existing.content_address.is_empty()
            && !self.cluster.unpin(&existing.content_address).await
        {
            CleanupWarning {
                operation: "update-certificate",
                target: existing.content_address.clone(),
                reason: "superseded content could not be unpinned".to_string(),
            }
            .emit();
        }

        let content_address = match self.place_pdf(&merged.id, pdf).await {
            Ok(cid) => cid,
            Err(e) => {
                saga.abort().await;
                return Err(e);
            }
        };
        saga.retain("upload-pdf", content_address.clone());
        merged.content_address = content_address;

        self.commit_record(caller_org, token, "UpdateIjazah", merged, saga)
            .await
    }

    /// Revokes a certificate. Cleanup of the pinned PDF and the local
    /// photo is opportunistic; only the ledger call decides the outcome.
    pub async fn delete(&self, caller_org: &str, token: &str, id: &str) -> Result<(), ServiceError> {
        self.authorize_issuer(caller_org)?;

        match self.fetch(caller_org, token, id).await {
            Ok(record) => {
                if !record.content_address.is_empty()
                    && !self.cluster.unpin(&record.content_address).await
                {
                    CleanupWarning {
                        operation: "delete-certificate",
                        target: record.content_address.clone(),
                        reason: "content could not be unpinned".to_string(),
                    }
                    .emit();
                }
                if !record.photo_reference.is_empty()
                    && !self.blobs.delete_photo(&record.photo_reference).await
                {
                    CleanupWarning {
                        operation: "delete-certificate",
                        target: record.photo_reference.clone(),
                        reason: "photo blob could not be deleted".to_string(),
                    }
                    .emit();
                }
            }
            Err(e) => debug!("no cleanup context for certificate '{}': {}", id, e),
        }

        self.gateway
            .invoke(
                caller_org,
                token,
                "DeleteIjazah",
                &[id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        org: &str,
        token: &str,
        id: &str,
    ) -> Result<CertificateResponse, ServiceError> {
        let record = self.fetch(org, token, id).await?;
        Ok(CertificateResponse::from_record(
            record,
            self.cluster.public_gateway(),
        ))
    }

    pub async fn get_all(
        &self,
        org: &str,
        token: &str,
    ) -> Result<Vec<CertificateResponse>, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "GetAllIjazah",
                &[],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let records: Vec<Certificate> =
            serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
                message: format!("malformed certificate listing: {}", e),
                orphaned: Vec::new(),
            })?;
        Ok(records
            .into_iter()
            .map(|record| CertificateResponse::from_record(record, self.cluster.public_gateway()))
            .collect())
    }

    /// Resolves a student number against the static reference roster.
    /// This is an external data source, unrelated to ledger state.
    pub fn find_by_nim(&self, nim: &str) -> Option<&'static RosterEntry> {
        roster::find_by_nim(nim)
    }

    async fn fetch(&self, org: &str, token: &str, id: &str) -> Result<Certificate, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "ReadIjazah",
                &[id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Err(ServiceError::NotFound(format!("certificate '{}'", id)));
        }
        serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
            message: format!("malformed certificate record: {}", e),
            orphaned: Vec::new(),
        })
    }

    async fn active_signature(&self, org: &str, token: &str) -> Result<Signature, ServiceError> {
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
            return Err(ServiceError::Validation(
                "no active signature registered".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
            message: format!("malformed active-signature record: {}", e),
            orphaned: Vec::new(),
        })
    }

    async fn signature_reference(
        &self,
        org: &str,
        token: &str,
        signature_id: &str,
    ) -> Result<String, ServiceError> {
        let value = self
            .gateway
            .query(
                org,
                token,
                "ReadSignature",
                &[signature_id.to_string()],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await?;
        if value.is_null() {
            return Err(ServiceError::Generation(format!(
                "signature record '{}' is missing",
                signature_id
            )));
        }
        let signature: Signature =
            serde_json::from_value(value).map_err(|e| ServiceError::Ledger {
                message: format!("malformed signature record: {}", e),
                orphaned: Vec::new(),
            })?;
        Ok(signature.content_reference)
    }

    /// Reads both normalized images back from the blob store and renders
    /// the PDF. Any I/O or render failure surfaces as a generation
    /// failure.
    async fn render(
        &self,
        record: &Certificate,
        signature_reference: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let photo = self
            .blobs
            .get_photo(&record.photo_reference)
            .await
            .map_err(|e| ServiceError::Generation(format!("photo unavailable: {}", e)))?;
        let signature = self
            .blobs
            .get_signature(signature_reference)
            .await
            .map_err(|e| ServiceError::Generation(format!("signature image unavailable: {}", e)))?;
        self.renderer
            .render(record, &photo, &signature)
            .map_err(|e| ServiceError::Generation(e.to_string()))
    }

    /// Uploads the rendered PDF and pins it. A pin failure is logged
    /// only; the content is already addressable.
    async fn place_pdf(&self, record_id: &str, pdf: Vec<u8>) -> Result<String, ServiceError> {
        let upload = self
            .cluster
            .add(
                pdf,
                AddOptions {
                    filename: format!("{}.pdf", record_id),
                    ..Default::default()
                },
            )
            .await?;
        if !self.cluster.pin(&upload.content_address).await {
            warn!(
                "pin failed for {}; content placed but unpinned",
                upload.content_address
            );
        }
        Ok(upload.content_address)
    }

    /// Final step of create/update: the ledger write. On failure the
    /// saga unwinds and the retained artifact references travel on the
    /// error.
    async fn commit_record(
        &self,
        org: &str,
        token: &str,
        method: &str,
        record: Certificate,
        saga: Saga,
    ) -> Result<CertificateResponse, ServiceError> {
        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
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
                org,
                token,
                method,
                &[payload],
                self.gateway.channel(),
                self.gateway.contract(),
            )
            .await
        {
            Ok(confirmed) => {
                saga.commit();
                let record = serde_json::from_value(confirmed).unwrap_or(record);
                Ok(CertificateResponse::from_record(
                    record,
                    self.cluster.public_gateway(),
                ))
            }
            Err(e) => {
                let orphaned = saga.abort().await;
                Err(ServiceError::ledger(e, orphaned))
            }
        }
    }
}
