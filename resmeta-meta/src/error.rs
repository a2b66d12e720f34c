//! Error types for the binding engine.

use thiserror::Error;

/// Result type for engine operations.
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors that can occur while resolving or populating.
///
/// Dynamic lookups never fail with these; an absent dynamic member
/// resolves to no value.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Declared-only resolution found no matching member.
    #[error("unknown property '{property}' on type {type_name}")]
    UnknownProperty { type_name: String, property: String },

    /// The type is not registered and cannot be described.
    #[error("unknown type {0}")]
    UnknownType(String),

    /// An operation that is illegal for its operands, e.g. appending a
    /// property to a term whose value type does not declare it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Required constructor parameters with no value in the source.
    #[error("missing constructor parameters for {type_name}: {}", .parameters.join(", "))]
    MissingConstructorParameters {
        type_name: String,
        parameters: Vec<String>,
    },

    /// A value could not be converted to the member's type.
    #[error(transparent)]
    Value(#[from] resmeta_types::Error),

    /// Configuration could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
