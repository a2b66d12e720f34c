//! Terms: ordered chains of properties from a root type to a value.

use crate::error::{MetaError, MetaResult};
use crate::property::{IndexPosition, Property};
use crate::type_cache::TypeCache;
use resmeta_types::{Value, ValueType};
use std::fmt;
use std::hash::{Hash, Hasher};

/// An immutable path into an object graph.
///
/// A term is *declared* when every link is a declared property; such terms
/// are strongly typed and cacheable. Any dynamic link makes the whole term
/// dynamic, and evaluation then never fails on a type mismatch.
#[derive(Clone)]
pub struct Term {
    store: Vec<Property>,
    key: String,
    actual_names_key: String,
    /// Separator the term was parsed with.
    separator: String,
    /// Component names joined with `separator`, for flattened records.
    flat_key: String,
    is_declared: bool,
    condition_skip: bool,
}

impl Term {
    #[must_use]
    pub fn empty() -> Self {
        Self::from_properties(Vec::new())
    }

    #[must_use]
    pub fn from_properties(store: Vec<Property>) -> Self {
        let key = join(store.iter().map(Property::name), ".");
        let actual_names_key = join(store.iter().map(Property::actual_name), ".");
        let is_declared = store.iter().all(Property::is_declared);
        let condition_skip = store.iter().any(Property::condition_skip);
        Self {
            store,
            flat_key: key.clone(),
            key,
            actual_names_key,
            separator: ".".to_string(),
            is_declared,
            condition_skip,
        }
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.store
    }

    /// Component names joined with `.`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Backing member names joined with `.`.
    #[must_use]
    pub fn actual_names_key(&self) -> &str {
        &self.actual_names_key
    }

    /// Rebinds the separator used to match whole keys of flattened records.
    #[must_use]
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.flat_key = self.render(separator);
        self.separator = separator.to_string();
        self
    }

    /// Separator the term was parsed with, `.` by default.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Component names joined with `separator`.
    #[must_use]
    pub fn render(&self, separator: &str) -> String {
        join(self.store.iter().map(Property::name), separator)
    }

    #[must_use]
    pub fn is_declared(&self) -> bool {
        self.is_declared
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self.is_declared
    }

    #[must_use]
    pub fn condition_skip(&self) -> bool {
        self.condition_skip
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Property> {
        self.store.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Property> {
        self.store.last()
    }

    /// Static type of the value this term resolves to.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.last()
            .map_or(ValueType::Any, |property| property.value_type().clone())
    }

    /// True if any link is an "any element" index.
    #[must_use]
    pub fn has_unresolved_indexes(&self) -> bool {
        self.store.iter().any(|property| {
            matches!(property, Property::Index(index) if index.position() == IndexPosition::Any)
        })
    }

    // ── Algebra ──────────────────────────────────────────────────

    /// Concatenates `next` onto this term.
    ///
    /// A dynamic left side turns every declared property of `next` into a
    /// dynamic one with declared fallback. Otherwise, with `check_types`,
    /// the first property of `next` must be declared on the value type of
    /// this term's last property.
    pub fn append(&self, next: &Term, check_types: bool) -> MetaResult<Term> {
        self.append_all(next.properties(), check_types)
    }

    /// Appends a single property. Same rules as [`append`](Self::append).
    pub fn append_property(&self, next: Property, check_types: bool) -> MetaResult<Term> {
        self.append_all(std::slice::from_ref(&next), check_types)
    }

    fn append_all(&self, next: &[Property], check_types: bool) -> MetaResult<Term> {
        let mut store = self.store.clone();
        if self.is_empty() {
            store.extend(next.iter().cloned());
        } else if self.is_dynamic() {
            store.extend(next.iter().map(Property::to_dynamic));
        } else {
            if check_types {
                if let Some(Property::Declared(first)) = next.first() {
                    let expected = self.value_type();
                    if expected.object_name() != Some(first.owner()) {
                        return Err(MetaError::InvalidOperation(format!(
                            "type {} is not a declared member of {} (appending {} to {})",
                            first.owner(),
                            expected,
                            first.name(),
                            self.key
                        )));
                    }
                }
            }
            store.extend(next.iter().cloned());
        }
        Ok(Term::from_properties(store).with_separator(&self.separator))
    }

    // ── Evaluation ───────────────────────────────────────────────

    /// Evaluates this term against `target`, left to right.
    ///
    /// Short-circuits to `Value::Null` at the first null link. A map target
    /// is first searched for the whole key, joined with the term's
    /// separator, since processed records may be keyed by full paths.
    pub async fn get_value(&self, types: &TypeCache, target: &Value) -> Value {
        if let Some(value) = self.whole_key_lookup(target) {
            return value;
        }
        let mut current = target.clone();
        for property in &self.store {
            if current.is_null() {
                return Value::Null;
            }
            current = property.get_value(types, &current).await;
        }
        current
    }

    /// Evaluates without suspending. `None` if any link has an async getter.
    #[must_use]
    pub fn get_value_now(&self, types: &TypeCache, target: &Value) -> Option<Value> {
        if let Some(value) = self.whole_key_lookup(target) {
            return Some(value);
        }
        let mut current = target.clone();
        for property in &self.store {
            if current.is_null() {
                return Some(Value::Null);
            }
            current = property.get_value_now(types, &current)?;
        }
        Some(current)
    }

    fn whole_key_lookup(&self, target: &Value) -> Option<Value> {
        match target {
            Value::Map(map) if self.len() > 1 => map.find(&self.flat_key).map(|(_, value)| value),
            _ => None,
        }
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>, separator: &str) -> String {
    names.collect::<Vec<_>>().join(separator)
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.is_declared == other.is_declared
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.is_declared.hash(state);
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("key", &self.key)
            .field("is_declared", &self.is_declared)
            .field("store", &self.store)
            .finish()
    }
}
