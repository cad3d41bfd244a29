// src/models/signature.rs
//! Signing-authority signature record.

use serde::{Deserialize, Serialize};

/// A signing-authority signature image registered on the ledger.
///
/// At most one signature should be active at a time. The invariant is
/// soft: it is enforced by the chaincode's `SetActiveSignature`
/// transition, not by a ledger-level constraint, and concurrent
/// activations can still race.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// Record identifier, `signature_{timestampMillis}`.
    pub id: String,

    /// Local blob-store filename or URL of the signature image.
    pub content_reference: String,

    /// Whether this signature is embedded into newly issued certificates.
    pub is_active: bool,

    /// Owning organization.
    pub owner: String,

    pub created_at: String,
    pub updated_at: String,
}

impl Signature {
    /// Generates a fresh signature identifier.
    pub fn new_id() -> String {
        format!("signature_{}", super::timestamp_millis())
    }
}

/// Partial signature data supplied when updating a record. Absent fields
/// keep their prior values.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignatureUpdate {
    pub content_reference: Option<String>,
    pub is_active: Option<bool>,
}

/// Ledger-confirmed record enriched with the file-serving URL of the
/// signature image.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResponse {
    #[serde(flatten)]
    pub signature: Signature,
    pub content_url: String,
}

impl SignatureResponse {
    pub fn from_record(signature: Signature) -> Self {
        // A contentReference that is already a URL is served as-is.
        let content_url = if signature.content_reference.starts_with("http") {
            signature.content_reference.clone()
        } else {
            format!("/api/files/signatures/{}", signature.content_reference)
        };
        SignatureResponse {
            signature,
            content_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Signature {
        Signature {
            id: "signature_1690000000000".to_string(),
            content_reference: "signature_1690000000000.png".to_string(),
            is_active: true,
            owner: "rektor".to_string(),
            created_at: "2023-07-22T08:00:00+00:00".to_string(),
            updated_at: "2023-07-22T08:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["contentReference"], "signature_1690000000000.png");
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn response_url_for_local_filename() {
        let resp = SignatureResponse::from_record(sample());
        assert_eq!(
            resp.content_url,
            "/api/files/signatures/signature_1690000000000.png"
        );
    }

    #[test]
    fn response_url_passthrough_for_urls() {
        let mut sig = sample();
        sig.content_reference = "https://cdn.example/sig.png".to_string();
        let resp = SignatureResponse::from_record(sig);
        assert_eq!(resp.content_url, "https://cdn.example/sig.png");
    }
}
