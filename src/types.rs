use serde::{Deserialize, Serialize};

/// Project-wide Result type
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Free-form vendor data attached to results
pub type ExtendedData = serde_json::Map<String, serde_json::Value>;

/// Outcome of storing a certificate in a vendor certificate repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Vendor-assigned identifier, stable for the lifetime of the remote object
    pub cert_id: String,
    /// Vendor-side label
    pub cert_name: String,
    /// Vendor specific extras
    #[serde(default)]
    pub extended_data: ExtendedData,
}

impl UploadResult {
    pub fn new(cert_id: impl Into<String>, cert_name: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            cert_name: cert_name.into(),
            extended_data: ExtendedData::new(),
        }
    }

    pub fn with_extended(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extended_data.insert(key.to_string(), value.into());
        self
    }
}

/// Outcome of binding a certificate to a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    #[serde(default)]
    pub extended_data: ExtendedData,
}

impl DeployResult {
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extended_data.insert(key.to_string(), value.into());
        self
    }
}
