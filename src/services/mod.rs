// src/services/mod.rs
//! Lifecycle services composing the ledger gateway, the storage cluster
//! and the local blob store into certificate and signature operations.

pub mod certificate_service;
pub mod health;
pub mod roster;
pub mod saga;
pub mod signature_service;

pub use certificate_service::CertificateService;
pub use health::HealthService;
pub use signature_service::SignatureService;
