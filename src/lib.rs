//! certrelay - TLS certificate distribution core
//!
//! Provisions ACME DNS-01 challenge records, uploads certificates to vendor
//! certificate stores without duplicating them, and deploys them to many
//! targets through a bounded, cancellable task pool.

// Foundational layer
pub mod error;
pub mod types;
pub mod utils;
pub mod telemetry;
pub mod config;

// Core layer
pub mod crypto;
pub mod pool;

// Provider layer
pub mod challenge;
pub mod manager;
pub mod deployer;
pub mod registry;

// Application layer
pub mod service;

// Public key types
pub use crate::error::Error;
pub use crate::types::{DeployResult, Result, UploadResult};
pub use crate::challenge::AcmeChallenger;
pub use crate::manager::SslManager;
pub use crate::deployer::SslDeployer;
pub use crate::pool::TaskPool;
pub use crate::crypto::certificates_equal;
pub use crate::service::DeployService;
pub use crate::telemetry::metrics::MetricsCollector;
