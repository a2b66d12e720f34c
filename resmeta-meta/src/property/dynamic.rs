//! Run-time resolved members.

use super::declared::DeclaredProperty;
use super::index::IndexPosition;
use crate::error::MetaResult;
use crate::type_cache::TypeCache;
use resmeta_types::Value;
use std::sync::Arc;

enum Lookup {
    Found(String, Value),
    Declared(Arc<DeclaredProperty>),
    Absent,
}

/// A member looked up by name on whatever value it is applied to.
///
/// Lookups ignore case. An absent member is not an error; it simply has
/// no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicProperty {
    name: String,
    declared_fallback: bool,
}

impl DynamicProperty {
    pub fn new(name: impl Into<String>, declared_fallback: bool) -> Self {
        Self {
            name: name.into(),
            declared_fallback,
        }
    }

    /// The name as requested, before any case rebinding.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declared_fallback(&self) -> bool {
        self.declared_fallback
    }

    /// Lookup order: the dynamic-member protocol, then string-keyed
    /// containers (maps and map tails, exact case first), then, if
    /// enabled, a declared member of the target's runtime type.
    fn lookup(&self, types: &TypeCache, target: &Value) -> Lookup {
        match target {
            Value::Map(map) => match map.find(&self.name) {
                Some((key, value)) => Lookup::Found(key, value),
                None => Lookup::Absent,
            },
            Value::List(list) => match IndexPosition::parse(&self.name).and_then(|p| p.read(list)) {
                Some(value) => Lookup::Found(self.name.clone(), value),
                None => Lookup::Absent,
            },
            Value::Object(object) => {
                if let Some(def) = types.registry().get(object.type_name().as_str()) {
                    if let Some((key, value)) = def.try_get_member(object, &self.name) {
                        return Lookup::Found(key, value);
                    }
                    if let Some((key, value)) = def.tail_find(object, &self.name) {
                        return Lookup::Found(key, value);
                    }
                }
                if self.declared_fallback {
                    if let Ok(property) = types.find_declared(&target.runtime_type(), &self.name) {
                        return Lookup::Declared(property);
                    }
                }
                Lookup::Absent
            }
            _ => Lookup::Absent,
        }
    }

    /// Resolves against `target`, returning the canonical name that matched
    /// and its value, or `None` if the member is absent.
    pub async fn resolve(&self, types: &TypeCache, target: &Value) -> Option<(String, Value)> {
        match self.lookup(types, target) {
            Lookup::Found(key, value) => Some((key, value)),
            Lookup::Declared(property) => {
                let value = property.get_value(target).await;
                Some((property.name().to_string(), value))
            }
            Lookup::Absent => None,
        }
    }

    /// Reads without suspending. `None` if a declared fallback has an async getter.
    #[must_use]
    pub fn get_value_now(&self, types: &TypeCache, target: &Value) -> Option<Value> {
        match self.lookup(types, target) {
            Lookup::Found(_, value) => Some(value),
            Lookup::Declared(property) => property.get_value_now(target),
            Lookup::Absent => Some(Value::Null),
        }
    }

    /// Writes the member on `target`.
    ///
    /// Objects are tried through the dynamic-member protocol, then a
    /// declared member (if fallback is enabled), then their map tail.
    /// Targets that accept none of these are left untouched.
    pub fn set_value(&self, types: &TypeCache, target: &Value, value: Value) -> MetaResult<()> {
        match target {
            Value::Map(map) => {
                map.set(&self.name, value);
            }
            Value::List(list) => {
                if let Some(position) = IndexPosition::parse(&self.name) {
                    position.write(list, value);
                }
            }
            Value::Object(object) => {
                let def = types.registry().get(object.type_name().as_str());
                if def.is_some_and(|def| def.try_set_member(object, &self.name, value.clone())) {
                    return Ok(());
                }
                if self.declared_fallback {
                    if let Ok(property) = types.find_declared(&target.runtime_type(), &self.name) {
                        return property.set_value(target, value);
                    }
                }
                if let Some(def) = def {
                    def.tail_set(object, &self.name, value);
                }
            }
            _ => {}
        }
        Ok(())
    }
}
