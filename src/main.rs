// src/main.rs

//! # Academic Certificate System - Main Entry Point
//!
//! Wires the orchestration core together and reports start-up health.
//!
//! ## Architecture Overview
//! 1. **Ledger Layer**: `GatewayClient` for per-organization enrollment
//!    and chaincode invoke/query calls
//! 2. **Storage Layer**: `ClusterClient` (content-addressed cluster) and
//!    `BlobStore` (local normalized image blobs)
//! 3. **Services Layer**: certificate/signature lifecycle and composite
//!    health
//!
//! Configuration comes from `config/default.toml` overridden by
//! `IJAZAH_*` environment variables; a `.env` file is honored.

use crate::config::AppConfig;
use crate::ledger::GatewayClient;
use crate::pdf::{CertificateRenderer, TemplateRenderer};
use crate::services::{CertificateService, HealthService, SignatureService};
use crate::storage::{BlobStore, ClusterClient};
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod config; // Layered application configuration
mod errors; // Error taxonomy
mod ledger; // Ledger gateway and token cache
mod models; // Data structures
mod pdf; // Certificate rendering
mod services; // Lifecycle orchestration
mod storage; // Cluster and local blob storage

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let app_config = AppConfig::load().context("configuration load failed")?;
    info!(
        "configured organizations: {}",
        app_config
            .ledger
            .organizations
            .iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Core components, shared across services via Arc
    let gateway = Arc::new(GatewayClient::new(app_config.ledger.clone()));
    let cluster = Arc::new(
        ClusterClient::new(app_config.cluster.clone()).context("cluster client init failed")?,
    );
    let blobs =
        Arc::new(BlobStore::new(&app_config.uploads.root).context("blob store init failed")?);
    let renderer: Arc<dyn CertificateRenderer> = Arc::new(TemplateRenderer);

    let _certificates = CertificateService::new(
        gateway.clone(),
        cluster.clone(),
        blobs.clone(),
        renderer,
        app_config.ledger.issuer_org.clone(),
    );
    let _signatures = SignatureService::new(
        gateway.clone(),
        blobs.clone(),
        app_config.ledger.signer_org.clone(),
    );
    let health = HealthService::new(gateway.clone(), cluster, blobs);

    // Eager admin enrollment; a failure here degrades rather than aborts.
    gateway.init_admin_tokens().await;

    let report = health.check().await;
    info!(
        "subsystem health: {}",
        serde_json::to_string_pretty(&report).context("health report serialization failed")?
    );
    if report.healthy {
        info!("all subsystems healthy");
    } else {
        warn!("one or more subsystems degraded");
    }

    Ok(())
}
