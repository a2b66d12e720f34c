//! Runtime value model for resmeta.
//!
//! This crate defines the plugin-agnostic types every layer of the binding
//! engine passes around:
//! - [`Value`]: the closed tagged union a property read or write carries
//! - [`ValueType`]: static type descriptors for declared members
//! - [`Object`], [`SharedList`], [`SharedMap`]: shared handles with reference identity
//! - [`PopulateSource`]: the name/value tree a content decoder hands to the populator
//! - [`TypeName`] and [`PropertyId`] identifiers
//!
//! Nothing here knows about members, terms or caches; those live in
//! `resmeta-model` and `resmeta-meta`.

mod ids;
mod source;
mod value;

pub use ids::{PropertyId, TypeName};
pub use source::PopulateSource;
pub use value::{FromValue, Object, SharedList, SharedMap, Value, ValueType};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when converting or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Mismatch`] against the runtime type of `found`.
    pub fn mismatch(expected: impl Into<String>, found: &Value) -> Self {
        Self::Mismatch {
            expected: expected.into(),
            found: found.type_label(),
        }
    }
}
