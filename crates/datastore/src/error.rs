use datastore_path::{MissingNode, PathSyntaxError};
use thiserror::Error;

/// Errors returned to callers of the store and node API.
///
/// Navigation misses are not errors; they surface as `None`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] PathSyntaxError),

    #[error(transparent)]
    Missing(#[from] MissingNode),

    #[error("Invalid mutation at '{path}': {reason}")]
    InvalidMutation { path: String, reason: &'static str },

    #[error("Path must start with a $source segment: '{0}'")]
    RelativePath(String),

    #[error("Invalid source name: '{0}'")]
    InvalidSourceName(String),

    #[error("Source already registered: '${0}'")]
    DuplicateSource(String),

    #[error(transparent)]
    Payload(#[from] LoadError),
}

impl StoreError {
    pub(crate) fn invalid_mutation(path: &str, reason: &'static str) -> Self {
        StoreError::InvalidMutation {
            path: path.to_string(),
            reason,
        }
    }
}

/// Why a remote source failed to load.
///
/// Recorded on the source and observed through its load state; never
/// returned from navigation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("NO_ENDPOINT")]
    NoEndpoint,

    #[error("NO_TRANSPORT")]
    NoTransport,

    #[error("Unbound URL parameter: {{{0}}}")]
    UnboundParameter(String),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Missing envelope marker: {0}")]
    Envelope(String),

    #[error("Invalid JSON payload: {0}")]
    Json(String),

    #[error("Invalid XML payload: {0}")]
    Xml(String),
}

/// Configuration could not be read or validated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Io(String),

    #[error("Invalid configuration: {0}")]
    Parse(String),

    #[error("Invalid source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
