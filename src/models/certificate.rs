// src/models/certificate.rs
//! Academic certificate record as stored on the ledger.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a certificate record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Active,
    Inactive,
}

/// A certificate record. Field names follow the chaincode's camelCase
/// wire contract.
///
/// Once set, `contentAddress` refers to one immutable, previously pinned
/// object in the storage cluster; updates replace it, never mutate it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Record identifier, `ijazah_{timestampMillis}`.
    pub id: String,

    /// Full name of the certificate holder.
    pub holder_name: String,

    /// Student identification number.
    pub nim: String,

    pub study_program: String,
    pub faculty: String,

    /// Graduation date as written on the printed certificate.
    pub graduation_date: String,

    /// Registry number printed on the certificate.
    pub certificate_number: String,

    /// Content address (CID) of the rendered PDF in the storage cluster.
    pub content_address: String,

    /// Signature record active at issuance time.
    pub signature_id: String,

    /// Local blob-store filename of the holder's photo.
    pub photo_reference: String,

    pub status: CertificateStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Certificate {
    /// Generates a fresh certificate identifier.
    pub fn new_id() -> String {
        format!("ijazah_{}", super::timestamp_millis())
    }

    /// Applies the fields present in `update`, leaving the rest as-is.
    /// `updatedAt` is the caller's responsibility.
    pub fn apply_update(&mut self, update: &CertificateUpdate) {
        if let Some(v) = &update.holder_name {
            self.holder_name = v.clone();
        }
        if let Some(v) = &update.nim {
            self.nim = v.clone();
        }
        if let Some(v) = &update.study_program {
            self.study_program = v.clone();
        }
        if let Some(v) = &update.faculty {
            self.faculty = v.clone();
        }
        if let Some(v) = &update.graduation_date {
            self.graduation_date = v.clone();
        }
        if let Some(v) = &update.certificate_number {
            self.certificate_number = v.clone();
        }
        if let Some(v) = update.status {
            self.status = v;
        }
    }
}

/// Holder data supplied when issuing a certificate.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    pub holder_name: String,
    pub nim: String,
    pub study_program: String,
    pub faculty: String,
    pub graduation_date: String,
    pub certificate_number: String,
}

/// Partial holder data supplied when updating a certificate. Absent
/// fields keep their prior values.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CertificateUpdate {
    pub holder_name: Option<String>,
    pub nim: Option<String>,
    pub study_program: Option<String>,
    pub faculty: Option<String>,
    pub graduation_date: Option<String>,
    pub certificate_number: Option<String>,
    pub status: Option<CertificateStatus>,
}

/// Ledger-confirmed record enriched with derived serving URLs.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub certificate: Certificate,

    /// Public gateway URL of the rendered PDF.
    pub content_url: String,

    /// File-serving URL of the holder's photo.
    pub photo_url: String,
}

impl CertificateResponse {
    /// Derives the serving URLs from the record and the cluster's public
    /// read gateway.
    pub fn from_record(certificate: Certificate, public_gateway: &str) -> Self {
        let content_url = format!(
            "{}/ipfs/{}",
            public_gateway.trim_end_matches('/'),
            certificate.content_address
        );
        let photo_url = format!("/api/files/photos/{}", certificate.photo_reference);
        CertificateResponse {
            certificate,
            content_url,
            photo_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Certificate {
        Certificate {
            id: "ijazah_1700000000000".to_string(),
            holder_name: "Jane Doe".to_string(),
            nim: "12345678901".to_string(),
            study_program: "Informatika".to_string(),
            faculty: "Teknik".to_string(),
            graduation_date: "2023-09-16".to_string(),
            certificate_number: "IJZ/2023/0001".to_string(),
            content_address: "QmAbc123".to_string(),
            signature_id: "signature_1690000000000".to_string(),
            photo_reference: "photo_1700000000000.png".to_string(),
            status: CertificateStatus::Active,
            created_at: "2023-09-16T08:00:00+00:00".to_string(),
            updated_at: "2023-09-16T08:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["holderName"], "Jane Doe");
        assert_eq!(json["contentAddress"], "QmAbc123");
        assert_eq!(json["photoReference"], "photo_1700000000000.png");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn update_keeps_absent_fields() {
        let mut cert = sample();
        let update = CertificateUpdate {
            holder_name: Some("Jane A. Doe".to_string()),
            ..Default::default()
        };
        cert.apply_update(&update);
        assert_eq!(cert.holder_name, "Jane A. Doe");
        assert_eq!(cert.nim, "12345678901");
        assert_eq!(cert.photo_reference, "photo_1700000000000.png");
        assert_eq!(cert.status, CertificateStatus::Active);
    }

    #[test]
    fn response_derives_urls() {
        let resp = CertificateResponse::from_record(sample(), "http://localhost:8080/");
        assert_eq!(resp.content_url, "http://localhost:8080/ipfs/QmAbc123");
        assert_eq!(resp.photo_url, "/api/files/photos/photo_1700000000000.png");
    }

    #[test]
    fn new_ids_carry_prefix() {
        assert!(Certificate::new_id().starts_with("ijazah_"));
    }
}
