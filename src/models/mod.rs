// src/models/mod.rs
//! Ledger-anchored data models.
//!
//! The ledger record is the sole source of truth for field values and
//! status; cluster and local artifacts are derived, regenerable caches
//! keyed by content address or filename.

pub mod certificate;
pub mod signature;

/// Millisecond timestamp used for record IDs and generated filenames.
///
/// Two calls within the same millisecond collide; the scheme is kept
/// as-is and the risk documented rather than papered over.
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// RFC3339 timestamp for `createdAt`/`updatedAt` fields.
pub fn timestamp_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
