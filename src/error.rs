//! Error types for the observability addon operator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API call failed
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Invalid or missing configuration input
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A YAML payload could not be decoded
    #[error("YAML decode error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Whether a short requeue is likely to clear the failure.
    ///
    /// API errors (including optimistic-concurrency conflicts) resolve by
    /// re-reading fresh state on the next pass; configuration and decode
    /// errors need operator intervention and retry on a longer interval.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::KubeError(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
