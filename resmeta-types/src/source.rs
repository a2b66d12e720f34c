//! The content-decoder boundary.
//!
//! A [`PopulateSource`] is the order-independent name/value tree a
//! JSON/XML/etc. decoder produces. The engine never parses wire formats
//! itself; `From<serde_json::Value>` is the reference adapter.

use crate::{Result, Value};

/// An abstract input tree to merge onto an object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulateSource {
    Null,
    /// A scalar leaf (bool, number, string).
    Scalar(Value),
    /// An ordered sequence of sources.
    Array(Vec<PopulateSource>),
    /// Named children. A name may be missing when the decoder produced an
    /// anonymous member; such entries are never bound.
    Object(Vec<(Option<String>, PopulateSource)>),
}

impl PopulateSource {
    /// Decodes a JSON document into a source tree.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(value.into())
    }

    /// Builds an object source from named children.
    pub fn object<N: Into<String>>(entries: impl IntoIterator<Item = (N, PopulateSource)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(name, source)| (Some(name.into()), source))
                .collect(),
        )
    }

    /// Builds a scalar source.
    pub fn scalar(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Self::Null,
            value => Self::Scalar(value),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Named children of an object source; empty for every other shape.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PopulateSource)> {
        let entries: &[(Option<String>, PopulateSource)] = match self {
            Self::Object(entries) => entries,
            _ => &[],
        };
        entries
            .iter()
            .filter_map(|(name, source)| name.as_deref().map(|name| (name, source)))
    }

    /// Finds a named child ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PopulateSource> {
        let lowered = name.to_lowercase();
        self.entries()
            .find(|(key, _)| *key == name)
            .or_else(|| self.entries().find(|(key, _)| key.to_lowercase() == lowered))
            .map(|(_, source)| source)
    }
}

impl From<serde_json::Value> for PopulateSource {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(name, value)| (Some(name), value.into()))
                    .collect(),
            ),
            scalar => Self::Scalar(scalar.into()),
        }
    }
}
