//! Crate-wide error type.
//!
//! Every failure class of the control-plane maps to one variant; resolution
//! lookups (`UnitNotFound`, `AliasNotFound`, `ResourceUnavailable`) are fatal
//! to the specific call and never silently defaulted.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A section or process document failed structural/type validation.
    #[error("invalid configuration: {0}")]
    ConfigStructure(String),

    /// Aggregated validation failure. Individual offenses are logged before
    /// this is raised.
    #[error("bad config: {offenses} invalid definition(s), see log for details")]
    BadConfig { offenses: usize },

    /// Symbolic unit name absent from all category tables.
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    /// A string config reference matched no tier alias table.
    #[error("config alias not found: {0}")]
    AliasNotFound(String),

    /// A declared resource key has no entry in the resource section.
    #[error("global resource not available: {0}")]
    ResourceUnavailable(String),

    /// A resolved implementation does not satisfy the requested category
    /// contract. Indicates a config/registry inconsistency, never retried.
    #[error("capability mismatch: unit '{name}' is {actual}, expected {expected}")]
    CapabilityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Write attempted against a frozen config tree.
    #[error("config tree is frozen")]
    ImmutabilityViolation,

    /// Controller lifecycle failure (spawn or stop).
    #[error("controller error: {0}")]
    Controller(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigStructure(msg.into())
    }

    pub fn controller<S: Into<String>>(msg: S) -> Self {
        Error::Controller(msg.into())
    }

    pub fn is_capability_mismatch(&self) -> bool {
        matches!(self, Error::CapabilityMismatch { .. })
    }

    pub fn is_unit_not_found(&self) -> bool {
        matches!(self, Error::UnitNotFound(_))
    }
}
