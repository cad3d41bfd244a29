// src/config.rs
//! Application configuration.
//!
//! Configuration is layered: an optional `config/default.toml` file is read
//! first, then overridden by `IJAZAH_*` environment variables (with `__` as
//! the section separator, e.g. `IJAZAH_CLUSTER__PRIMARY_API`). Every field
//! has a default so the binary starts against a local development topology
//! with no configuration at all.

use serde::Deserialize;
use std::path::PathBuf;

/// One ledger organization and its gateway/CA coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgConfig {
    /// Organization name as known to the ledger network (e.g. "akademik").
    pub name: String,
    /// Base URL of this organization's REST gateway.
    pub gateway_url: String,
    /// Administrative identity enrolled eagerly at start-up.
    pub admin_username: String,
    pub admin_secret: String,
}

/// Ledger-side configuration: organizations, channel/contract routing and
/// the admin-token lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub organizations: Vec<OrgConfig>,
    /// Organization allowed to issue certificates.
    pub issuer_org: String,
    /// Organization owning signing-authority signatures.
    pub signer_org: String,
    pub channel: String,
    pub contract: String,
    /// Cached admin tokens are re-enrolled after this many seconds.
    pub token_ttl_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            organizations: vec![
                OrgConfig {
                    name: "akademik".to_string(),
                    gateway_url: "http://localhost:4100".to_string(),
                    admin_username: "admin".to_string(),
                    admin_secret: "adminpw".to_string(),
                },
                OrgConfig {
                    name: "rektor".to_string(),
                    gateway_url: "http://localhost:4200".to_string(),
                    admin_username: "admin".to_string(),
                    admin_secret: "adminpw".to_string(),
                },
            ],
            issuer_org: "akademik".to_string(),
            signer_org: "rektor".to_string(),
            channel: "ijazah-channel".to_string(),
            contract: "ijazah-contract".to_string(),
            token_ttl_secs: 3600,
        }
    }
}

/// Storage-cluster endpoints and HTTP behavior.
///
/// `primary_api` receives every mutating call; `fallback_api` is consulted
/// only by the timeout-bounded health probe.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub primary_api: String,
    pub fallback_api: String,
    /// Public read gateway serving `GET /ipfs/{cid}`.
    pub public_gateway: String,
    /// Basic-auth credentials exchanged for a JWT when set.
    pub username: Option<String>,
    pub password: Option<String>,
    pub health_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            primary_api: "http://localhost:9094".to_string(),
            fallback_api: "http://localhost:9194".to_string(),
            public_gateway: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            health_timeout_secs: 2,
            request_timeout_secs: 30,
        }
    }
}

/// Local blob-store layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Root directory holding `photos/` and `signatures/`.
    pub root: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        UploadsConfig {
            root: PathBuf::from("uploads"),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub cluster: ClusterConfig,
    pub uploads: UploadsConfig,
}

impl AppConfig {
    /// Loads configuration from `config/default.toml` (if present) layered
    /// under `IJAZAH_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("IJAZAH").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Looks up an organization's configuration by name.
    #[allow(dead_code)]
    pub fn org(&self, name: &str) -> Option<&OrgConfig> {
        self.ledger.organizations.iter().find(|o| o.name == name)
    }
}
