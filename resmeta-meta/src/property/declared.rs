//! Declared properties and their change listeners.

use crate::error::MetaResult;
use crate::term::Term;
use dashmap::DashMap;
use resmeta_model::{Getter, MemberDef, Operators, PropertyAttributes, Setter, TypeRegistry};
use resmeta_types::{Object, PropertyId, TypeName, Value, ValueType};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A value that may not have been observable.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Known(Value),
    /// The value could not be read at notification time.
    Unknown,
}

impl Observed {
    #[must_use]
    pub fn known(&self) -> Option<&Value> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }
}

/// A single observed mutation of a declared property.
pub struct PropertyChanged<'a> {
    pub property: &'a DeclaredProperty,
    pub target: &'a Object,
    pub old_value: &'a Observed,
    pub new_value: &'a Value,
}

pub type ChangeListener = Arc<dyn Fn(&PropertyChanged<'_>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Accessors = (Option<Getter>, Option<Setter>);

enum Binding {
    /// Accessors of the member itself, valid on instances of the owner.
    Direct {
        getter: Option<Getter>,
        setter: Option<Setter>,
    },
    /// An interface member; accessors are looked up on the runtime type
    /// of each target.
    Interface { interface: TypeName, member: String },
}

/// A member known from a type's accessor table.
///
/// Created once per `(owner type, member)` by the type cache and shared
/// for the life of the process. Only the listener list ever changes.
pub struct DeclaredProperty {
    id: PropertyId,
    name: String,
    actual_name: String,
    owner: TypeName,
    value_type: ValueType,
    attributes: PropertyAttributes,
    binding: Binding,
    registry: Arc<TypeRegistry>,
    /// Accessors resolved per runtime type other than the owner.
    dispatch: DashMap<TypeName, Accessors>,
    defines_terms: OnceLock<Vec<Arc<Term>>>,
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl DeclaredProperty {
    fn with_binding(
        owner: TypeName,
        name: String,
        actual_name: String,
        value_type: ValueType,
        attributes: PropertyAttributes,
        binding: Binding,
        registry: &Arc<TypeRegistry>,
    ) -> Self {
        Self {
            id: PropertyId::new(),
            name,
            actual_name,
            owner,
            value_type,
            attributes,
            binding,
            registry: Arc::clone(registry),
            dispatch: DashMap::new(),
            defines_terms: OnceLock::new(),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// A property bound directly to `member`'s accessors.
    pub(crate) fn from_member(
        owner: &TypeName,
        member: &MemberDef,
        registry: &Arc<TypeRegistry>,
    ) -> Self {
        Self::with_binding(
            owner.clone(),
            member.name().to_string(),
            member.actual_name().to_string(),
            member.value_type().clone(),
            member.property_attributes().clone(),
            Binding::Direct {
                getter: member.get().cloned(),
                setter: member.set().cloned(),
            },
            registry,
        )
    }

    /// A property exposed under an interface member's name and type but
    /// backed by the implementing member of the concrete type.
    pub(crate) fn surfaced(
        owner: &TypeName,
        interface_member: &MemberDef,
        implementation: Option<&MemberDef>,
        registry: &Arc<TypeRegistry>,
    ) -> Self {
        Self::with_binding(
            owner.clone(),
            interface_member.name().to_string(),
            implementation
                .map_or(interface_member.actual_name(), MemberDef::actual_name)
                .to_string(),
            interface_member.value_type().clone(),
            interface_member.property_attributes().clone(),
            Binding::Direct {
                getter: implementation.and_then(|m| m.get().cloned()),
                setter: implementation.and_then(|m| m.set().cloned()),
            },
            registry,
        )
    }

    /// A member of `interface` exposed on `owner` (the interface itself or
    /// one extending it), dispatched on each target's runtime type.
    pub(crate) fn interface_member(
        owner: &TypeName,
        interface: &TypeName,
        member: &MemberDef,
        registry: &Arc<TypeRegistry>,
    ) -> Self {
        let binding = if member.get().is_some() || member.set().is_some() {
            Binding::Direct {
                getter: member.get().cloned(),
                setter: member.set().cloned(),
            }
        } else {
            Binding::Interface {
                interface: interface.clone(),
                member: member.name().to_string(),
            }
        };
        Self::with_binding(
            owner.clone(),
            member.name().to_string(),
            member.actual_name().to_string(),
            member.value_type().clone(),
            member.property_attributes().clone(),
            binding,
            registry,
        )
    }

    // ── Metadata ─────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn actual_name(&self) -> &str {
        &self.actual_name
    }

    #[must_use]
    pub fn owner(&self) -> &TypeName {
        &self.owner
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    #[must_use]
    pub fn order(&self) -> Option<i32> {
        self.attributes.order
    }

    #[must_use]
    pub fn hidden(&self) -> bool {
        self.attributes.hidden
    }

    #[must_use]
    pub fn hidden_if_null(&self) -> bool {
        self.attributes.hidden_if_null
    }

    #[must_use]
    pub fn skip_conditions(&self) -> bool {
        self.attributes.skip_conditions
    }

    #[must_use]
    pub fn replace_on_update(&self) -> bool {
        self.attributes.replace_on_update
    }

    #[must_use]
    pub fn merge_onto_owner(&self) -> bool {
        self.attributes.merge_onto_owner
    }

    #[must_use]
    pub fn allowed_operators(&self) -> Operators {
        self.attributes.allowed_operators
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeSet<String> {
        &self.attributes.flags
    }

    /// Raw names of the terms this property defines.
    #[must_use]
    pub fn defines(&self) -> &[String] {
        &self.attributes.defines
    }

    /// Resolved terms, relative to the owner, whose value depends on this property.
    #[must_use]
    pub fn defines_property_terms(&self) -> &[Arc<Term>] {
        self.defines_terms
            .get()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn set_defines_property_terms(&self, terms: Vec<Arc<Term>>) {
        // First writer wins; concurrent discoveries resolve the same terms.
        let _ = self.defines_terms.set(terms);
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        match &self.binding {
            Binding::Direct { getter, .. } => getter.is_some(),
            Binding::Interface { .. } => true,
        }
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        match &self.binding {
            Binding::Direct { setter, .. } => setter.is_some(),
            Binding::Interface { .. } => true,
        }
    }

    // ── Access ───────────────────────────────────────────────────

    /// Accessors for `target`. Instances of the owner use the member's own
    /// accessors; subclass instances and interface implementors bind to the
    /// nearest member with the same backing name on their runtime type.
    fn accessors(&self, target: &Object) -> Accessors {
        let runtime = target.type_name();
        if let Binding::Direct { getter, setter } = &self.binding {
            if *runtime == self.owner {
                return (getter.clone(), setter.clone());
            }
        }
        let cached = self
            .dispatch
            .get(runtime)
            .map(|accessors| accessors.value().clone());
        if let Some(accessors) = cached {
            return accessors;
        }
        let resolved = self.resolve_on(runtime);
        self.dispatch
            .entry(runtime.clone())
            .or_insert(resolved)
            .value()
            .clone()
    }

    fn resolve_on(&self, runtime: &TypeName) -> Accessors {
        let actual = match &self.binding {
            Binding::Direct { getter, setter } => {
                if !self
                    .registry
                    .is_subclass_of(runtime.as_str(), self.owner.as_str())
                {
                    return (getter.clone(), setter.clone());
                }
                self.actual_name.clone()
            }
            Binding::Interface { interface, member } => {
                let Some(def) = self.registry.get(runtime.as_str()) else {
                    return (None, None);
                };
                def.implementing_member(interface, member)
            }
        };
        let found = self
            .registry
            .member_chain(runtime.as_str())
            .into_iter()
            .flat_map(|(_, members)| members)
            .find(|m| m.actual_name().eq_ignore_ascii_case(&actual));
        match (found, &self.binding) {
            (Some(m), _) => (m.get().cloned(), m.set().cloned()),
            (None, Binding::Direct { getter, setter }) => (getter.clone(), setter.clone()),
            (None, Binding::Interface { .. }) => (None, None),
        }
    }

    /// Coerces `value` to this property's type. Object values may be any
    /// instance assignable to the declared object type.
    fn coerce(&self, value: Value) -> MetaResult<Value> {
        if let (Value::Object(object), Some(expected)) = (&value, self.value_type.object_name()) {
            if self
                .registry
                .is_assignable(object.type_name().as_str(), expected.as_str())
            {
                return Ok(value);
            }
        }
        Ok(value.coerce(&self.value_type)?)
    }

    /// Reads this property from `target`. Non-objects and missing getters
    /// read as `Value::Null`.
    pub async fn get_value(&self, target: &Value) -> Value {
        let Value::Object(object) = target else {
            return Value::Null;
        };
        match self.accessors(object).0 {
            Some(getter) => getter.get(object).await,
            None => Value::Null,
        }
    }

    /// Reads without suspending. `None` if the getter is async.
    #[must_use]
    pub fn get_value_now(&self, target: &Value) -> Option<Value> {
        let Value::Object(object) = target else {
            return Some(Value::Null);
        };
        match self.accessors(object).0 {
            Some(getter) => getter.get_now(object),
            None => Some(Value::Null),
        }
    }

    /// Writes this property on `target` and notifies listeners if the
    /// value observably changed. Read-only properties are a no-op.
    pub fn set_value(&self, target: &Value, value: Value) -> MetaResult<()> {
        let Value::Object(object) = target else {
            return Ok(());
        };
        let (getter, setter) = self.accessors(object);
        let Some(setter) = setter else {
            return Ok(());
        };
        let value = self.coerce(value)?;

        let observed = self.has_listeners();
        let old_value = match (&getter, observed) {
            (Some(getter), true) => getter.get_now(object).map_or(Observed::Unknown, Observed::Known),
            _ => Observed::Unknown,
        };

        object.write(|state| setter(state, value.clone()))?;

        if observed && old_value.known() != Some(&value) {
            self.notify(object, &old_value, &value);
        }
        Ok(())
    }

    // ── Listeners ────────────────────────────────────────────────

    pub fn subscribe(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn has_listeners(&self) -> bool {
        self.listener_count() > 0
    }

    fn notify(&self, target: &Object, old_value: &Observed, new_value: &Value) {
        // Listeners run without the lock held so they may (un)subscribe.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let change = PropertyChanged {
            property: self,
            target,
            old_value,
            new_value,
        };
        for listener in listeners {
            listener(&change);
        }
    }
}

impl PartialEq for DeclaredProperty {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeclaredProperty {}

impl Hash for DeclaredProperty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DeclaredProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredProperty")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("actual_name", &self.actual_name)
            .field("value_type", &self.value_type)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}
