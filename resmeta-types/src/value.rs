//! The runtime value model.
//!
//! [`Value`] is a closed tagged union. Scalars are plain data; lists, maps
//! and objects are shared handles, so two reads of the same property return
//! the same instance and a merge can reuse it in place.

use crate::{Error, Result, TypeName};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

// ── ValueType ────────────────────────────────────────────────────

/// Static type of a declared member or of a term component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The universal type. Values of any shape are accepted.
    Any,
    Bool,
    Int,
    Float,
    String,
    /// A named enumeration. Values are carried as strings.
    Enum(TypeName),
    /// Nullable wrapper around a value type.
    Nullable(Box<ValueType>),
    /// An ordered sequence of the element type.
    List(Box<ValueType>),
    /// A string-keyed mapping with values of the element type.
    Map(Box<ValueType>),
    /// A registered model type.
    Object(TypeName),
}

impl ValueType {
    /// Shorthand for `ValueType::Object`.
    pub fn object(name: impl Into<TypeName>) -> Self {
        Self::Object(name.into())
    }

    /// Shorthand for `ValueType::List`.
    pub fn list(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for `ValueType::Map`.
    pub fn map(element: ValueType) -> Self {
        Self::Map(Box::new(element))
    }

    /// Shorthand for `ValueType::Nullable`.
    pub fn nullable(inner: ValueType) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Strips any nullable wrappers.
    #[must_use]
    pub fn underlying(&self) -> &ValueType {
        match self {
            Self::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Returns true if `null` is a legal value of this type.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        !self.is_value_type()
    }

    /// Returns true for non-nullable scalars (bool, numbers, enums).
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float | Self::Enum(_))
    }

    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.underlying(), Self::Enum(_))
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self.underlying(), Self::Any)
    }

    /// Returns true for sequence types.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self.underlying(), Self::List(_))
    }

    /// Name of the model type behind this type, looking through nullable.
    #[must_use]
    pub fn object_name(&self) -> Option<&TypeName> {
        match self.underlying() {
            Self::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Element type of a sequence or mapping, looking through nullable.
    #[must_use]
    pub fn element_type(&self) -> Option<&ValueType> {
        match self.underlying() {
            Self::List(element) | Self::Map(element) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::String => f.write_str("String"),
            Self::Enum(name) | Self::Object(name) => write!(f, "{name}"),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Map(element) => write!(f, "Map<{element}>"),
        }
    }
}

// ── Object ───────────────────────────────────────────────────────

struct ObjectCell {
    type_name: TypeName,
    state: RwLock<Box<dyn Any + Send + Sync>>,
}

/// A shared instance of a registered model type.
///
/// The state is an arbitrary Rust value; accessor tables registered for
/// the type downcast it. Clones share the same instance.
#[derive(Clone)]
pub struct Object(Arc<ObjectCell>);

impl Object {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<TypeName>, state: T) -> Self {
        Self::from_boxed(type_name.into(), Box::new(state))
    }

    pub fn from_boxed(type_name: TypeName, state: Box<dyn Any + Send + Sync>) -> Self {
        Self(Arc::new(ObjectCell {
            type_name,
            state: RwLock::new(state),
        }))
    }

    /// Runtime type of this instance.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.0.type_name
    }

    /// Runs `f` against the untyped state under a read lock.
    pub fn read<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let guard = self.0.state.read().unwrap_or_else(PoisonError::into_inner);
        let state: &dyn Any = &**guard;
        f(state)
    }

    /// Runs `f` against the untyped state under a write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut guard = self.0.state.write().unwrap_or_else(PoisonError::into_inner);
        let state: &mut dyn Any = &mut **guard;
        f(state)
    }

    /// Runs `f` against the state if it is a `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.read(|state| state.downcast_ref::<T>().map(f))
    }

    /// Runs `f` against the mutable state if it is a `T`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write(|state| state.downcast_mut::<T>().map(f))
    }

    /// Returns true if both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}@{:p})", self.0.type_name, Arc::as_ptr(&self.0))
    }
}

// ── SharedList ───────────────────────────────────────────────────

/// A shared, ordered sequence of values.
#[derive(Clone, Default)]
pub struct SharedList(Arc<RwLock<Vec<Value>>>);

impl SharedList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(values: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(values)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Overwrites the element at `index`. Returns false if out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut values = self.0.write().unwrap_or_else(PoisonError::into_inner);
        match values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    /// Copies the current elements out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

// ── SharedMap ────────────────────────────────────────────────────

/// A shared, insertion-ordered, string-keyed container.
#[derive(Clone, Default)]
pub struct SharedMap(Arc<RwLock<IndexMap<String, Value>>>);

impl SharedMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self(Arc::new(RwLock::new(entries.into_iter().collect())))
    }

    /// Finds `name` in `map` ignoring case. An exact-case key wins over
    /// other case variants.
    pub fn lookup<'a, V>(map: &'a IndexMap<String, V>, name: &str) -> Option<(&'a String, &'a V)> {
        if let Some(found) = map.get_key_value(name) {
            return Some(found);
        }
        let lowered = name.to_lowercase();
        map.iter().find(|(key, _)| key.to_lowercase() == lowered)
    }

    /// Case-insensitive lookup returning the stored key and value.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<(String, Value)> {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner);
        Self::lookup(&map, name).map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Exact-key lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Inserts under the exact key, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value)
    }

    /// Overwrites the entry matching `name` ignoring case, or inserts a new
    /// one. Returns the key the value was stored under.
    pub fn set(&self, name: &str, value: Value) -> String {
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let key = Self::lookup(&map, name)
            .map(|(key, _)| key.clone())
            .unwrap_or_else(|| name.to_string());
        map.insert(key.clone(), value);
        key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Copies the current entries out, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

// ── Value ────────────────────────────────────────────────────────

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(SharedList),
    Map(SharedMap),
    Object(Object),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&SharedList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&SharedMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The runtime type tag used for dispatch.
    #[must_use]
    pub fn runtime_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::List(_) => ValueType::list(ValueType::Any),
            Self::Map(_) => ValueType::map(ValueType::Any),
            Self::Object(object) => ValueType::Object(object.type_name().clone()),
        }
    }

    /// Human readable name of the runtime type, `null` for [`Value::Null`].
    #[must_use]
    pub fn type_label(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            other => other.runtime_type().to_string(),
        }
    }

    /// Converts this value to the given static type.
    ///
    /// Integers widen to floats, integral floats narrow to integers, and
    /// `Any` accepts everything. Shared handles are never copied.
    pub fn coerce(self, target: &ValueType) -> Result<Value> {
        match (target, self) {
            (_, Value::Null) => Ok(Value::Null),
            (ValueType::Any, value) => Ok(value),
            (ValueType::Nullable(inner), value) => value.coerce(inner),
            (ValueType::Bool, value @ Value::Bool(_)) => Ok(value),
            (ValueType::Int, value @ Value::Int(_)) => Ok(value),
            (ValueType::Int, Value::Float(f)) if is_integral_i64(f) => Ok(Value::Int(f as i64)),
            (ValueType::Float, value @ Value::Float(_)) => Ok(value),
            (ValueType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (ValueType::String | ValueType::Enum(_), value @ Value::String(_)) => Ok(value),
            (ValueType::List(_), value @ Value::List(_)) => Ok(value),
            (ValueType::Map(_), value @ Value::Map(_)) => Ok(value),
            (ValueType::Object(name), Value::Object(object)) if object.type_name() == name => {
                Ok(Value::Object(object))
            }
            (target, value) => Err(Error::mismatch(target.to_string(), &value)),
        }
    }
}

/// True if `f` is a whole number that `i64` holds exactly.
fn is_integral_i64(f: f64) -> bool {
    // i64::MIN is -2^63 exactly; i64::MAX rounds up to 2^63, which is out of range.
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<SharedList> for Value {
    fn from(value: SharedList) -> Self {
        Self::List(value)
    }
}

impl From<SharedMap> for Value {
    fn from(value: SharedMap) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(SharedList::from_vec(items.into_iter().map(Into::into).collect()))
            }
            serde_json::Value::Object(entries) => Self::Map(SharedMap::from_entries(
                entries.into_iter().map(|(k, v)| (k, v.into())),
            )),
        }
    }
}

// ── FromValue ────────────────────────────────────────────────────

/// Conversion out of a [`Value`], used by setters bound to struct fields.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| Error::mismatch("Bool", &value))
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value.coerce(&ValueType::Int)? {
            Value::Int(i) => Ok(i),
            other => Err(Error::mismatch("Int", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| Error::mismatch("Float", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::mismatch("String", &other)),
        }
    }
}

impl FromValue for Object {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(object),
            other => Err(Error::mismatch("Object", &other)),
        }
    }
}

impl FromValue for SharedList {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(list) => Ok(list),
            other => Err(Error::mismatch("List", &other)),
        }
    }
}

impl FromValue for SharedMap {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(map) => Ok(map),
            other => Err(Error::mismatch("Map", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
