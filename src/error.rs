use thiserror::Error;
use std::io;

/// Generic error type
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error, raised before any vendor call
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate or private key could not be parsed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Network or HTTP failure talking to a vendor
    #[error("{vendor}: {operation} transport failure: {message}")]
    Transport {
        vendor: String,
        operation: String,
        message: String,
    },

    /// Vendor answered but signalled a business error
    #[error("{vendor}: {operation} returned error {code}: {message}")]
    Vendor {
        vendor: String,
        operation: String,
        code: String,
        message: String,
    },

    /// Record or resource is absent
    #[error("{vendor}: {resource} not found")]
    NotFound { vendor: String, resource: String },

    /// Failure of a vendor primitive, with the calling context attached
    #[error("{vendor}: {operation} failed: {source}")]
    Provider {
        vendor: String,
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// Caller cancelled the operation
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Several independent targets failed
    #[error("{} targets failed: {}", .0.len(), join_messages(.0))]
    Multiple(Vec<Error>),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn transport(vendor: &str, operation: &str, message: impl ToString) -> Self {
        Error::Transport {
            vendor: vendor.to_string(),
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn vendor(vendor: &str, operation: &str, code: impl ToString, message: impl ToString) -> Self {
        Error::Vendor {
            vendor: vendor.to_string(),
            operation: operation.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found(vendor: &str, resource: impl ToString) -> Self {
        Error::NotFound {
            vendor: vendor.to_string(),
            resource: resource.to_string(),
        }
    }

    pub fn cancelled(operation: impl ToString) -> Self {
        Error::Cancelled {
            operation: operation.to_string(),
        }
    }

    /// Attach the vendor and operation that produced this error
    pub fn context(self, vendor: &str, operation: &str) -> Self {
        Error::Provider {
            vendor: vendor.to_string(),
            operation: operation.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether this error is a cancellation, looking through context wrappers
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Provider { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this error is a soft not-found condition, looking through context wrappers
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Provider { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Fold a list of per-target errors into one
    ///
    /// No errors is success, a single error is returned as is, anything more
    /// becomes [`Error::Multiple`].
    pub fn aggregate(mut errors: Vec<Error>) -> Result<(), Error> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML error: {}", err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::transport("http", "request", err)
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Internal(format!("Metrics error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_names_vendor_and_operation() {
        let err = Error::transport("acme-cdn", "list certificates", "connection reset")
            .context("acme-cdn", "upload");
        let message = err.to_string();
        assert!(message.contains("acme-cdn"));
        assert!(message.contains("upload"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_soft_conditions_survive_wrapping() {
        assert!(Error::not_found("dns", "record 1").context("dns", "delete").is_not_found());
        assert!(Error::cancelled("list").context("store", "list").is_cancelled());
        assert!(!Error::Internal("boom".into()).is_not_found());
    }

    #[test]
    fn test_aggregate() {
        assert!(Error::aggregate(vec![]).is_ok());

        let single = Error::aggregate(vec![Error::Config("a".into())]).unwrap_err();
        assert!(matches!(single, Error::Config(_)));

        let joined = Error::aggregate(vec![
            Error::Config("first".into()),
            Error::Internal("second".into()),
        ])
        .unwrap_err();
        match &joined {
            Error::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        let message = joined.to_string();
        assert!(message.contains("first"));
        assert!(message.contains("second"));
    }
}
