// src/ledger/mod.rs
//! Ledger gateway interactions: identity enrollment, admin-token caching
//! and chaincode invoke/query primitives.

pub mod gateway_client;
pub mod token_cache;

pub use gateway_client::GatewayClient;
pub use token_cache::TokenCache;
