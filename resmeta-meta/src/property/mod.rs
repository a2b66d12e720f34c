//! The property family: named, typed accessors that make up a [`Term`](crate::Term).
//!
//! - [`DeclaredProperty`]: a member known from a type's accessor table
//! - [`DynamicProperty`]: a member resolved by name at run time
//! - [`IndexProperty`]: a positional (`3`), last (`-`) or any (`*`) element of a sequence

mod declared;
mod dynamic;
mod index;

pub use declared::{ChangeListener, DeclaredProperty, ListenerId, Observed, PropertyChanged};
pub use dynamic::DynamicProperty;
pub use index::{IndexPosition, IndexProperty};

use crate::error::MetaResult;
use crate::type_cache::TypeCache;
use resmeta_types::{Value, ValueType};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

static ANY_TYPE: ValueType = ValueType::Any;
static NO_FLAGS: BTreeSet<String> = BTreeSet::new();

/// One link of a term.
#[derive(Clone)]
pub enum Property {
    Declared(Arc<DeclaredProperty>),
    Dynamic(DynamicProperty),
    Index(IndexProperty),
}

impl Property {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Declared(p) => p.name(),
            Self::Dynamic(p) => p.name(),
            Self::Index(p) => p.name(),
        }
    }

    /// Backing member name. Differs from [`name`](Self::name) for renamed
    /// or interface-surfaced members.
    #[must_use]
    pub fn actual_name(&self) -> &str {
        match self {
            Self::Declared(p) => p.actual_name(),
            Self::Dynamic(p) => p.name(),
            Self::Index(p) => p.name(),
        }
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        match self {
            Self::Declared(p) => p.value_type(),
            Self::Dynamic(_) => &ANY_TYPE,
            Self::Index(p) => p.element_type(),
        }
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    #[must_use]
    pub fn is_declared(&self) -> bool {
        matches!(self, Self::Declared(_))
    }

    #[must_use]
    pub fn as_declared(&self) -> Option<&Arc<DeclaredProperty>> {
        match self {
            Self::Declared(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.value_type().is_nullable()
    }

    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.value_type().is_enum()
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeSet<String> {
        match self {
            Self::Declared(p) => p.flags(),
            _ => &NO_FLAGS,
        }
    }

    /// Condition evaluation should skip terms through this property.
    #[must_use]
    pub fn condition_skip(&self) -> bool {
        self.as_declared().is_some_and(|p| p.skip_conditions())
    }

    /// This property as a dynamic one. Declared properties keep their name
    /// and fall back to declared resolution; others are returned unchanged.
    #[must_use]
    pub fn to_dynamic(&self) -> Property {
        match self {
            Self::Declared(p) => Self::Dynamic(DynamicProperty::new(p.name(), true)),
            other => other.clone(),
        }
    }

    /// Reads this property from `target`, awaiting async getters.
    /// Anything that cannot be read resolves to `Value::Null`.
    pub async fn get_value(&self, types: &TypeCache, target: &Value) -> Value {
        match self {
            Self::Declared(p) => p.get_value(target).await,
            Self::Dynamic(p) => p
                .resolve(types, target)
                .await
                .map(|(_, value)| value)
                .unwrap_or_default(),
            Self::Index(p) => p.get_value(target),
        }
    }

    /// Reads without suspending. `None` means an async getter is involved.
    #[must_use]
    pub fn get_value_now(&self, types: &TypeCache, target: &Value) -> Option<Value> {
        match self {
            Self::Declared(p) => p.get_value_now(target),
            Self::Dynamic(p) => p.get_value_now(types, target),
            Self::Index(p) => Some(p.get_value(target)),
        }
    }

    /// Writes this property on `target`. Read-only targets are a no-op.
    pub fn set_value(&self, types: &TypeCache, target: &Value, value: Value) -> MetaResult<()> {
        match self {
            Self::Declared(p) => p.set_value(target, value),
            Self::Dynamic(p) => p.set_value(types, target, value),
            Self::Index(p) => {
                p.set_value(target, value);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(p) => write!(f, "Declared({}.{})", p.owner(), p.name()),
            Self::Dynamic(p) => write!(f, "Dynamic({})", p.name()),
            Self::Index(p) => write!(f, "Index({})", p.name()),
        }
    }
}

impl From<Arc<DeclaredProperty>> for Property {
    fn from(property: Arc<DeclaredProperty>) -> Self {
        Self::Declared(property)
    }
}

impl From<DynamicProperty> for Property {
    fn from(property: DynamicProperty) -> Self {
        Self::Dynamic(property)
    }
}

impl From<IndexProperty> for Property {
    fn from(property: IndexProperty) -> Self {
        Self::Index(property)
    }
}
