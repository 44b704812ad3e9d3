//! Unified error types for the Hearth workspace.
//!
//! Errors fall into three classes that drive how a reconciliation cycle
//! reacts to them (see [`ErrorClass`]): configuration errors abort before
//! any engine call, resolution errors abort or fail a single service, and
//! action errors are recorded against one service and block its dependents.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HearthError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration source could not be parsed.
    #[error("failed to parse {origin}: {message}")]
    Parse {
        /// File name or description of the input.
        origin: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Two services share the same name.
    #[error("duplicate service name: \"{name}\"")]
    DuplicateService {
        /// The repeated name.
        name: String,
    },

    /// A service depends on a name that is not declared in the catalog.
    #[error("service \"{service}\" depends on undeclared service \"{dependency}\"")]
    UnknownDependency {
        /// The service declaring the dependency.
        service: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency detected between services: {}", services.join(", "))]
    DependencyCycle {
        /// Services participating in the cycle.
        services: Vec<String>,
    },

    /// A descriptor field is syntactically or semantically malformed.
    #[error("service \"{service}\" field `{field}`: {message}")]
    Malformed {
        /// Offending service.
        service: String,
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A placeholder without a default is not defined in any layer.
    #[error(
        "service \"{service}\" field `{field}`: variable `{key}` is not set and has no default"
    )]
    UnresolvedPlaceholder {
        /// Offending service.
        service: String,
        /// Field containing the placeholder.
        field: String,
        /// The missing variable.
        key: String,
    },

    /// The container engine rejected or failed an operation.
    #[error("engine {operation} failed for \"{service}\": {message}")]
    Engine {
        /// Engine operation (`start`, `stop`, `pull`, `list`).
        operation: &'static str,
        /// Service or image the operation targeted.
        service: String,
        /// Engine diagnostic.
        message: String,
    },

    /// An engine action did not finish within the configured timeout.
    #[error("{operation} of \"{service}\" timed out after {limit:?}")]
    Timeout {
        /// Engine operation that timed out.
        operation: &'static str,
        /// Service the operation targeted.
        service: String,
        /// The timeout that elapsed.
        limit: Duration,
    },

    /// A reconciliation cycle is already running.
    #[error("a reconciliation cycle is already in progress")]
    CycleInProgress,

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Coarse classification of a [`HearthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Invalid or unreadable configuration. Always fatal.
    Config,
    /// A placeholder could not be resolved.
    Resolution,
    /// An engine call failed for one service.
    Action,
    /// The cycle itself could not run.
    Cycle,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Resolution => write!(f, "resolution"),
            Self::Action => write!(f, "action"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

impl HearthError {
    /// Returns the class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Io { .. }
            | Self::Parse { .. }
            | Self::DuplicateService { .. }
            | Self::UnknownDependency { .. }
            | Self::DependencyCycle { .. }
            | Self::Malformed { .. }
            | Self::Serialization { .. } => ErrorClass::Config,
            Self::UnresolvedPlaceholder { .. } => ErrorClass::Resolution,
            Self::Engine { .. } | Self::Timeout { .. } => ErrorClass::Action,
            Self::CycleInProgress | Self::NotFound { .. } => ErrorClass::Cycle,
        }
    }

    /// Returns the service this error is attributed to, if any.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::DuplicateService { name: service }
            | Self::UnknownDependency { service, .. }
            | Self::Malformed { service, .. }
            | Self::UnresolvedPlaceholder { service, .. }
            | Self::Engine { service, .. }
            | Self::Timeout { service, .. } => Some(service),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HearthError>;
