use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Invalid configuration for operation '{operation}': {reason}")]
    Configuration { operation: String, reason: String },

    #[error("Introspection error: {0}")]
    Introspection(#[from] ModelError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Client error: {0}")]
    Client(String),
}

/// Failures while loading or reading a service model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No service model found for '{service}' (searched: {searched:?})")]
    ServiceNotFound { service: String, searched: Vec<PathBuf> },

    #[error("Operation '{operation}' not found in the '{service}' service model")]
    OperationNotFound { service: String, operation: String },

    #[error("Shape '{shape}' referenced by '{service}' is not defined")]
    MissingShape { service: String, shape: String },

    #[error("Operation '{operation}' of '{service}' has an input member named '{member}', which is reserved")]
    ReservedMember {
        service: String,
        operation: String,
        member: String,
    },

    #[error("Malformed service model for '{service}': {reason}")]
    Malformed { service: String, reason: String },

    #[error("Unable to read service model {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse service model {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{0}' not found")]
    UnknownTool(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
