// src/services/health.rs
//! Composite subsystem health for operational dashboards.
//!
//! Aggregates ledger gateway reachability (per organization), cluster
//! introspection and blob-store usage into one report. Never consulted
//! on the request path.

use crate::ledger::GatewayClient;
use crate::storage::blob_store::StorageStats;
use crate::storage::{BlobStore, ClusterClient};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One aggregated health snapshot.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// AND of all three subsystems.
    pub healthy: bool,
    /// Per-organization ledger gateway reachability.
    pub ledger: HashMap<String, bool>,
    /// Cluster identity/version, absent when introspection failed.
    pub cluster: Option<Value>,
    /// Blob-store usage, absent when the filesystem scan failed.
    pub storage: Option<StorageStats>,
}

pub struct HealthService {
    gateway: Arc<GatewayClient>,
    cluster: Arc<ClusterClient>,
    blobs: Arc<BlobStore>,
}

impl HealthService {
    pub fn new(
        gateway: Arc<GatewayClient>,
        cluster: Arc<ClusterClient>,
        blobs: Arc<BlobStore>,
    ) -> Self {
        HealthService {
            gateway,
            cluster,
            blobs,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let (ledger, cluster, storage) = tokio::join!(
            self.gateway.health_check(),
            self.cluster.info(),
            self.blobs.storage_stats(),
        );

        let ledger_healthy = !ledger.is_empty() && ledger.values().all(|ok| *ok);
        let cluster = cluster.ok();
        let storage = storage.ok();
        let healthy = ledger_healthy && cluster.is_some() && storage.is_some();

        HealthReport {
            healthy,
            ledger,
            cluster,
            storage,
        }
    }
}
