//! Error types for tuple-space operations
//!
//! Not-found is never an error: read and take return `None`. Errors describe
//! why an operation could not be attempted at all.

use thiserror::Error;

/// Errors raised by schema resolution, configuration and lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// Entry or schema names a type that was never registered
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Entry sets an attribute its type does not declare or inherit
    #[error("attribute `{attribute}` is not declared by type `{type_name}`")]
    UndeclaredAttribute {
        /// Runtime type of the entry
        type_name: String,
        /// Offending attribute name
        attribute: String,
    },

    /// Schema declares an attribute that is already visible on the type
    #[error("type `{type_name}` declares attribute `{attribute}` more than once")]
    DuplicateAttribute {
        /// Type being registered
        type_name: String,
        /// Attribute declared twice (directly or through a parent)
        attribute: String,
    },

    /// Type was registered before with a different schema
    #[error("type `{0}` is already registered with a different schema")]
    SchemaConflict(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The space was shut down
    #[error("space is shut down")]
    ShutDown,

    /// I/O error (worker thread spawn, config file read)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tuple-space operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the error comes from schema resolution.
    ///
    /// Schema errors are the "extraction failure" class: the entry cannot be
    /// described, so the operation is abandoned.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownType(_)
                | Error::UndeclaredAttribute { .. }
                | Error::DuplicateAttribute { .. }
                | Error::SchemaConflict(_)
        )
    }

    /// Check if the error is caused by a shut-down space
    pub fn is_shut_down(&self) -> bool {
        matches!(self, Error::ShutDown)
    }
}
