// src/errors.rs
//! Error types for the certificate orchestration core.
//!
//! Errors are layered: each external-facing client has its own error enum
//! (`GatewayError` for the ledger gateway, `StorageError` for the cluster
//! and local blob store), and the service layer maps them into the
//! operation-level taxonomy (`ServiceError`) that callers receive.
//!
//! `CleanupWarning` is the one deliberate exception: failed best-effort
//! compensation never aborts an operation. It is logged and swallowed.

use thiserror::Error;

/// Errors raised by the ledger gateway client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Enrollment against the gateway's CA was rejected or unreachable.
    #[error("enrollment failed for organization '{org}': {reason}")]
    Enrollment { org: String, reason: String },

    /// No cached admin token and re-enrollment is not possible right now.
    #[error("admin token not available for organization '{0}'")]
    AdminTokenUnavailable(String),

    /// The organization is not part of the configured network.
    #[error("unknown organization '{0}'")]
    UnknownOrganization(String),

    /// A state-changing chaincode call failed.
    #[error("ledger invoke '{method}' failed: {reason}")]
    Invoke { method: String, reason: String },

    /// A read-only chaincode call failed.
    #[error("ledger query '{method}' failed: {reason}")]
    Query { method: String, reason: String },

    /// Transport-level failure talking to the gateway.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a body we could not interpret.
    #[error("unexpected gateway response: {0}")]
    BadResponse(String),
}

/// Errors raised by the storage-cluster client and the local blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The cluster accepted the upload but returned no content address.
    #[error("cluster returned no content address for '{0}'")]
    MissingContentAddress(String),

    /// The cluster rejected an upload.
    #[error("cluster upload failed: {0}")]
    Upload(String),

    /// Uploaded bytes could not be decoded as an image.
    #[error("invalid image data: {0}")]
    InvalidImage(String),

    /// Local filesystem failure.
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure talking to the cluster.
    #[error("cluster transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The cluster answered with a body we could not interpret.
    #[error("unexpected cluster response: {0}")]
    BadResponse(String),
}

/// Operation-level error taxonomy surfaced to callers.
///
/// Every variant aborts the running operation. Best-effort cleanup
/// failures are not part of this enum; see [`CleanupWarning`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller's organization is not allowed to perform the operation.
    /// Raised before any side effect.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The addressed record does not exist on the ledger.
    #[error("not found: {0}")]
    NotFound(String),

    /// A precondition on the request failed (missing photo, no active
    /// signature, ...). Raised before any content upload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rendering the certificate PDF failed.
    #[error("certificate generation failed: {0}")]
    Generation(String),

    /// Placing content in the storage cluster failed.
    #[error("content upload failed: {0}")]
    Upload(String),

    /// The ledger write failed after earlier steps already committed.
    ///
    /// `orphaned` lists artifact references (content addresses, blob
    /// filenames) that were created and retained; they have no matching
    /// ledger record and are reconciled out of band.
    #[error("ledger operation failed: {message}")]
    Ledger {
        message: String,
        orphaned: Vec<String>,
    },
}

impl ServiceError {
    /// Wraps a gateway failure, attaching the artifact references left
    /// behind by steps that already committed.
    pub fn ledger(err: GatewayError, orphaned: Vec<String>) -> Self {
        ServiceError::Ledger {
            message: err.to_string(),
            orphaned,
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        ServiceError::Ledger {
            message: err.to_string(),
            orphaned: Vec::new(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Upload(err.to_string())
    }
}

/// A failed best-effort compensation step.
///
/// Never propagated: emitted through the log and swallowed, so the
/// surrounding operation's outcome is unaffected.
#[derive(Debug)]
pub struct CleanupWarning {
    pub operation: &'static str,
    pub target: String,
    pub reason: String,
}

impl CleanupWarning {
    /// Logs the warning at `warn!` level. Consumes the warning; there is
    /// nothing else to do with one.
    pub fn emit(self) {
        log::warn!(
            "cleanup failed during {}: target '{}': {}",
            self.operation,
            self.target,
            self.reason
        );
    }
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cleanup failed during {}: target '{}': {}",
            self.operation, self.target, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_carries_orphaned_artifacts() {
        let err = ServiceError::ledger(
            GatewayError::Invoke {
                method: "CreateIjazah".to_string(),
                reason: "gateway timeout".to_string(),
            },
            vec!["QmAbc123".to_string(), "photo_1700000000000.png".to_string()],
        );

        match err {
            ServiceError::Ledger { message, orphaned } => {
                assert!(message.contains("CreateIjazah"));
                assert_eq!(orphaned.len(), 2);
                assert_eq!(orphaned[0], "QmAbc123");
            }
            other => panic!("expected Ledger variant, got {:?}", other),
        }
    }

    #[test]
    fn gateway_error_converts_without_artifacts() {
        let err: ServiceError = GatewayError::AdminTokenUnavailable("akademik".to_string()).into();
        match err {
            ServiceError::Ledger { orphaned, .. } => assert!(orphaned.is_empty()),
            other => panic!("expected Ledger variant, got {:?}", other),
        }
    }

    #[test]
    fn storage_error_maps_to_upload() {
        let err: ServiceError = StorageError::MissingContentAddress("ijazah.pdf".to_string()).into();
        assert!(matches!(err, ServiceError::Upload(_)));
        assert!(err.to_string().contains("ijazah.pdf"));
    }
}
