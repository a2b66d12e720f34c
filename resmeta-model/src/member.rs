//! Member accessor tables.

use crate::attributes::{Operators, PropertyAttributes};
use crate::projection::StateProjection;
use futures::FutureExt;
use futures::future::BoxFuture;
use resmeta_types::{Error, FromValue, Object, Result, Value, ValueType};
use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Reads a member from the untyped state of an object.
pub type SyncGetter = Arc<dyn Fn(&dyn Any) -> Value + Send + Sync>;

/// Reads a member that may need to suspend, e.g. a lazily loaded store.
/// Receives the owning object so the future can be `'static`.
pub type AsyncGetter = Arc<dyn Fn(Object) -> BoxFuture<'static, Value> + Send + Sync>;

/// Writes a member on the untyped state of an object.
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum Getter {
    Sync(SyncGetter),
    Async(AsyncGetter),
}

impl Getter {
    /// Reads without suspending. Returns `None` for async getters.
    pub fn get_now(&self, target: &Object) -> Option<Value> {
        match self {
            Self::Sync(get) => Some(target.read(|state| get(state))),
            Self::Async(_) => None,
        }
    }

    /// Reads, awaiting async getters.
    pub async fn get(&self, target: &Object) -> Value {
        match self {
            Self::Sync(get) => target.read(|state| get(state)),
            Self::Async(get) => get(target.clone()).await,
        }
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Getter::Sync"),
            Self::Async(_) => f.write_str("Getter::Async"),
        }
    }
}

fn foreign_state<T>() -> Error {
    Error::Mismatch {
        expected: type_name::<T>().to_string(),
        found: "foreign object state".to_string(),
    }
}

/// One member of a model type.
#[derive(Clone)]
pub struct MemberDef {
    actual_name: String,
    value_type: ValueType,
    getter: Option<Getter>,
    setter: Option<Setter>,
    attributes: PropertyAttributes,
}

impl MemberDef {
    /// A member with no accessors yet. `actual_name` is the backing name.
    pub fn new(actual_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            actual_name: actual_name.into(),
            value_type,
            getter: None,
            setter: None,
            attributes: PropertyAttributes::default(),
        }
    }

    /// A read/write member bound to a struct field.
    pub fn field<T, V>(
        actual_name: impl Into<String>,
        value_type: ValueType,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self
    where
        T: Any,
        V: Clone + Into<Value> + FromValue + 'static,
    {
        Self::new(actual_name, value_type)
            .getter(move |t: &T| get(t).clone().into())
            .setter(move |t: &mut T, value: Value| {
                *get_mut(t) = V::from_value(value)?;
                Ok(())
            })
    }

    pub fn getter<T: Any>(mut self, get: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.getter = Some(Getter::Sync(Arc::new(move |state: &dyn Any| {
            state.downcast_ref::<T>().map(&get).unwrap_or(Value::Null)
        })));
        self
    }

    pub fn async_getter<F, Fut>(mut self, get: F) -> Self
    where
        F: Fn(Object) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.getter = Some(Getter::Async(Arc::new(move |object: Object| {
            get(object).boxed()
        })));
        self
    }

    pub fn setter<T: Any>(
        mut self,
        set: impl Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(move |state: &mut dyn Any, value: Value| {
            let target = state.downcast_mut::<T>().ok_or_else(foreign_state::<T>)?;
            set(target, value)
        }));
        self
    }

    /// This member as seen from a subtype whose state embeds the state this
    /// member's accessors expect. Async getters receive the whole object and
    /// are kept as they are.
    #[must_use]
    pub fn project(&self, projection: &StateProjection) -> Self {
        let getter = self.getter.clone().map(|getter| match getter {
            Getter::Sync(get) => {
                let projection = projection.clone();
                Getter::Sync(Arc::new(move |state: &dyn Any| {
                    projection.view(state).map_or(Value::Null, |inner| get(inner))
                }))
            }
            asynchronous @ Getter::Async(_) => asynchronous,
        });
        let setter = self.setter.clone().map(|set| {
            let projection = projection.clone();
            let setter: Setter = Arc::new(move |state: &mut dyn Any, value: Value| {
                match projection.view_mut(state) {
                    Some(inner) => set(inner, value),
                    None => Err(Error::Mismatch {
                        expected: "projected base state".to_string(),
                        found: "foreign object state".to_string(),
                    }),
                }
            });
            setter
        });
        Self {
            getter,
            setter,
            ..self.clone()
        }
    }

    /// Drops the setter, leaving a read-only member.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.setter = None;
        self
    }

    /// Drops the getter, leaving a write-only member.
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.getter = None;
        self
    }

    // ── Attributes ───────────────────────────────────────────────

    #[must_use]
    pub fn attributes(mut self, attributes: PropertyAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.attributes.rename = Some(name.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.attributes.order = Some(order);
        self
    }

    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.attributes.ignore = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.attributes.hidden = true;
        self
    }

    #[must_use]
    pub fn hidden_if_null(mut self) -> Self {
        self.attributes.hidden_if_null = true;
        self
    }

    #[must_use]
    pub fn skip_conditions(mut self) -> Self {
        self.attributes.skip_conditions = true;
        self
    }

    #[must_use]
    pub fn replace_on_update(mut self) -> Self {
        self.attributes.replace_on_update = true;
        self
    }

    #[must_use]
    pub fn merge_onto_owner(mut self) -> Self {
        self.attributes.merge_onto_owner = true;
        self
    }

    #[must_use]
    pub fn operators(mut self, operators: Operators) -> Self {
        self.attributes.allowed_operators = operators;
        self
    }

    /// Declares terms, relative to the owner, whose value this member defines.
    pub fn defines<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.attributes.defines.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.attributes.flags.insert(flag.into());
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The name the member is exposed under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.attributes.rename.as_deref().unwrap_or(&self.actual_name)
    }

    #[must_use]
    pub fn actual_name(&self) -> &str {
        &self.actual_name
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    #[must_use]
    pub fn get(&self) -> Option<&Getter> {
        self.getter.as_ref()
    }

    #[must_use]
    pub fn set(&self) -> Option<&Setter> {
        self.setter.as_ref()
    }

    #[must_use]
    pub fn property_attributes(&self) -> &PropertyAttributes {
        &self.attributes
    }
}

impl fmt::Debug for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDef")
            .field("name", &self.name())
            .field("actual_name", &self.actual_name)
            .field("value_type", &self.value_type)
            .field("getter", &self.getter)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}
