//! Positional access into sequences.

use resmeta_types::{SharedList, Value, ValueType};

/// Which element of a sequence an index property addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexPosition {
    At(usize),
    /// The last element, written `-`.
    Last,
    /// Any element, written `*`. Never resolves to a value; used where a
    /// term must stand for every element, e.g. in monitoring trees.
    Any,
}

impl IndexPosition {
    /// Parses `-`, `*` or a non-negative integer.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "-" => Some(Self::Last),
            "*" => Some(Self::Any),
            digits => digits.parse().ok().map(Self::At),
        }
    }

    /// Reads the addressed element of `list`.
    #[must_use]
    pub fn read(self, list: &SharedList) -> Option<Value> {
        match self {
            Self::At(index) => list.get(index),
            Self::Last => list.last(),
            Self::Any => None,
        }
    }

    /// Overwrites the addressed element of `list`. Returns false if there
    /// is no such element.
    pub fn write(self, list: &SharedList, value: Value) -> bool {
        match self {
            Self::At(index) => list.set(index, value),
            Self::Last => match list.len() {
                0 => false,
                len => list.set(len - 1, value),
            },
            Self::Any => false,
        }
    }
}

/// An element of a sequence-typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexProperty {
    name: String,
    position: IndexPosition,
    element_type: ValueType,
}

impl IndexProperty {
    #[must_use]
    pub fn new(position: IndexPosition, element_type: ValueType) -> Self {
        let name = match position {
            IndexPosition::At(index) => index.to_string(),
            IndexPosition::Last => "-".to_string(),
            IndexPosition::Any => "*".to_string(),
        };
        Self {
            name,
            position,
            element_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn position(&self) -> IndexPosition {
        self.position
    }

    #[must_use]
    pub fn element_type(&self) -> &ValueType {
        &self.element_type
    }

    /// Only list values can be written through an index.
    #[must_use]
    pub fn is_writable_on(&self, target: &Value) -> bool {
        matches!(target, Value::List(_)) && self.position != IndexPosition::Any
    }

    #[must_use]
    pub fn get_value(&self, target: &Value) -> Value {
        match target {
            Value::List(list) => self.position.read(list).unwrap_or_default(),
            _ => Value::Null,
        }
    }

    pub fn set_value(&self, target: &Value, value: Value) {
        if let Value::List(list) = target {
            self.position.write(list, value);
        }
    }
}
