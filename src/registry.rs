//! Provider factories keyed by name
//!
//! The renewal pipeline selects providers from user configuration: a name
//! plus a JSON object with camelCase fields. Construction validates the
//! configuration before any vendor call.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::challenge::{self, AcmeChallenger};
use crate::deployer::{self, SslDeployer};
use crate::error::Error;
use crate::manager::{self, SslManager};
use crate::types::Result;

pub const CHALLENGERS: &[&str] = &["mock", "webhook"];
pub const MANAGERS: &[&str] = &["mock"];
pub const DEPLOYERS: &[&str] = &["local", "mock", "webhook"];

fn parse_config<T: DeserializeOwned>(kind: &str, provider: &str, config: &Value) -> Result<T> {
    let config = if config.is_null() {
        Value::Object(Default::default())
    } else {
        config.clone()
    };

    serde_json::from_value(config)
        .map_err(|e| Error::Config(format!("invalid {} {} configuration: {}", provider, kind, e)))
}

fn unsupported(kind: &str, provider: &str, known: &[&str]) -> Error {
    Error::Config(format!(
        "unsupported {} provider {:?}, expected one of: {}",
        kind,
        provider,
        known.join(", ")
    ))
}

/// Create a DNS-01 challenger
pub fn create_challenger(provider: &str, config: &Value) -> Result<Arc<dyn AcmeChallenger>> {
    match provider {
        "mock" => Ok(Arc::new(challenge::mock::new_challenger(parse_config(
            "challenger",
            provider,
            config,
        )?)?)),
        "webhook" => Ok(Arc::new(challenge::webhook::new_challenger(parse_config(
            "challenger",
            provider,
            config,
        )?)?)),
        _ => Err(unsupported("challenger", provider, CHALLENGERS)),
    }
}

/// Create a certificate manager
pub fn create_manager(provider: &str, config: &Value) -> Result<Arc<dyn SslManager>> {
    match provider {
        "mock" => Ok(Arc::new(manager::mock::new_manager(parse_config(
            "manager", provider, config,
        )?)?)),
        _ => Err(unsupported("manager", provider, MANAGERS)),
    }
}

/// Create a deployer
pub fn create_deployer(provider: &str, config: &Value) -> Result<Arc<dyn SslDeployer>> {
    match provider {
        "local" => Ok(Arc::new(deployer::local::LocalDeployer::new(parse_config(
            "deployer", provider, config,
        )?)?)),
        "mock" => Ok(Arc::new(deployer::mock::new_deployer(parse_config(
            "deployer", provider, config,
        )?)?)),
        "webhook" => Ok(Arc::new(deployer::webhook::WebhookDeployer::new(parse_config(
            "deployer", provider, config,
        )?)?)),
        _ => Err(unsupported("deployer", provider, DEPLOYERS)),
    }
}
