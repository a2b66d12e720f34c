//! Type definitions: the per-type half of the accessor table.

use crate::attributes::TypeAttributes;
use crate::member::MemberDef;
use crate::projection::StateProjection;
use indexmap::IndexMap;
use resmeta_types::{Object, Result, SharedMap, TypeName, Value, ValueType};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The "try get / try set named member" protocol.
///
/// Types implementing it are queried by dynamic properties before any
/// container-style access. Lookups are expected to ignore case and report
/// the canonical key they matched.
pub trait DynamicMembers: Any + Send + Sync {
    fn try_get_member(&self, name: &str) -> Option<(String, Value)>;
    fn try_set_member(&mut self, name: &str, value: Value) -> bool;
}

trait DynamicAccess: Send + Sync {
    fn try_get(&self, state: &dyn Any, name: &str) -> Option<(String, Value)>;
    fn try_set(&self, state: &mut dyn Any, name: &str, value: Value) -> bool;
}

struct DynamicAdapter<T>(PhantomData<fn() -> T>);

impl<T: DynamicMembers> DynamicAccess for DynamicAdapter<T> {
    fn try_get(&self, state: &dyn Any, name: &str) -> Option<(String, Value)> {
        state.downcast_ref::<T>()?.try_get_member(name)
    }

    fn try_set(&self, state: &mut dyn Any, name: &str, value: Value) -> bool {
        state
            .downcast_mut::<T>()
            .is_some_and(|target| target.try_set_member(name, value))
    }
}

/// A string-keyed open tail carried by a statically typed model.
trait MapTail: Send + Sync {
    fn find(&self, state: &dyn Any, name: &str) -> Option<(String, Value)>;
    fn set(&self, state: &mut dyn Any, name: &str, value: Value) -> Option<String>;
    fn entries(&self, state: &dyn Any) -> Vec<(String, Value)>;
}

struct TypedMapTail<T> {
    get: fn(&T) -> &IndexMap<String, Value>,
    get_mut: fn(&mut T) -> &mut IndexMap<String, Value>,
}

impl<T: Any> MapTail for TypedMapTail<T> {
    fn find(&self, state: &dyn Any, name: &str) -> Option<(String, Value)> {
        let map = (self.get)(state.downcast_ref::<T>()?);
        SharedMap::lookup(map, name).map(|(key, value)| (key.clone(), value.clone()))
    }

    fn set(&self, state: &mut dyn Any, name: &str, value: Value) -> Option<String> {
        let map = (self.get_mut)(state.downcast_mut::<T>()?);
        let key = SharedMap::lookup(map, name)
            .map(|(key, _)| key.clone())
            .unwrap_or_else(|| name.to_string());
        map.insert(key.clone(), value);
        Some(key)
    }

    fn entries(&self, state: &dyn Any) -> Vec<(String, Value)> {
        state
            .downcast_ref::<T>()
            .map(|target| {
                (self.get)(target)
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub type Creator = Arc<dyn Fn() -> Object + Send + Sync>;
pub type ParameterizedCreator = Arc<dyn Fn(Vec<Value>) -> Result<Object> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorParameter {
    /// Matched against declared member names, ignoring case.
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
}

impl ConstructorParameter {
    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: false,
        }
    }
}

#[derive(Clone)]
pub enum Constructor {
    Parameterless(Creator),
    Parameterized {
        parameters: Vec<ConstructorParameter>,
        create: ParameterizedCreator,
    },
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameterless(_) => f.write_str("Parameterless"),
            Self::Parameterized { parameters, .. } => {
                f.debug_tuple("Parameterized").field(parameters).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// A registered model type.
pub struct TypeDef {
    name: TypeName,
    kind: TypeKind,
    base: Option<TypeName>,
    base_state: Option<StateProjection>,
    interfaces: Vec<TypeName>,
    /// interface -> (interface member -> implementing member's actual name)
    implementations: HashMap<TypeName, HashMap<String, String>>,
    attributes: TypeAttributes,
    members: Vec<MemberDef>,
    constructor: Option<Constructor>,
    dynamic: Option<Arc<dyn DynamicAccess>>,
    map_tail: Option<Arc<dyn MapTail>>,
}

impl TypeDef {
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self::with_kind(name.into(), TypeKind::Class)
    }

    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self::with_kind(name.into(), TypeKind::Interface)
    }

    fn with_kind(name: TypeName, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            base: None,
            base_state: None,
            interfaces: Vec::new(),
            implementations: HashMap::new(),
            attributes: TypeAttributes::default(),
            members: Vec::new(),
            constructor: None,
            dynamic: None,
            map_tail: None,
        }
    }

    pub fn base(mut self, base: impl Into<TypeName>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Declares a base type whose state is embedded in this type's state.
    /// Inherited members are read and written through `get`/`get_mut`.
    pub fn base_embedded<T: Any, B: Any>(
        mut self,
        base: impl Into<TypeName>,
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        self.base = Some(base.into());
        self.base_state = Some(StateProjection::new(get, get_mut));
        self
    }

    /// Declares an implemented (or, for interfaces, inherited) interface.
    pub fn extends(mut self, interface: impl Into<TypeName>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declares an implemented interface whose members delegate to
    /// differently named members of this type.
    pub fn implements<'a>(
        mut self,
        interface: impl Into<TypeName>,
        delegations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let interface = interface.into();
        let map = delegations
            .into_iter()
            .map(|(member, target)| (member.to_lowercase(), target.to_string()))
            .collect();
        self.implementations.insert(interface.clone(), map);
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: TypeAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    pub fn constructor<T: Any + Send + Sync>(
        mut self,
        create: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        let name = self.name.clone();
        self.constructor = Some(Constructor::Parameterless(Arc::new(move || {
            Object::new(name.clone(), create())
        })));
        self
    }

    pub fn parameterized_constructor<T: Any + Send + Sync>(
        mut self,
        parameters: Vec<ConstructorParameter>,
        create: impl Fn(Vec<Value>) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        let name = self.name.clone();
        self.constructor = Some(Constructor::Parameterized {
            parameters,
            create: Arc::new(move |arguments: Vec<Value>| {
                Ok(Object::new(name.clone(), create(arguments)?))
            }),
        });
        self
    }

    /// Enables the dynamic-member protocol for instances of this type.
    #[must_use]
    pub fn dynamic_members<T: DynamicMembers>(mut self) -> Self {
        self.dynamic = Some(Arc::new(DynamicAdapter::<T>(PhantomData)));
        self
    }

    /// Gives instances of this type an open string-keyed tail.
    #[must_use]
    pub fn map_tail<T: Any>(
        mut self,
        get: fn(&T) -> &IndexMap<String, Value>,
        get_mut: fn(&mut T) -> &mut IndexMap<String, Value>,
    ) -> Self {
        self.map_tail = Some(Arc::new(TypedMapTail { get, get_mut }));
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[must_use]
    pub fn base_type(&self) -> Option<&TypeName> {
        self.base.as_ref()
    }

    /// Projection from this type's state onto its base's, if they differ.
    #[must_use]
    pub fn base_projection(&self) -> Option<&StateProjection> {
        self.base_state.as_ref()
    }

    #[must_use]
    pub fn interfaces(&self) -> &[TypeName] {
        &self.interfaces
    }

    #[must_use]
    pub fn type_attributes(&self) -> &TypeAttributes {
        &self.attributes
    }

    #[must_use]
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    /// Finds an own member by actual name.
    #[must_use]
    pub fn member_by_actual_name(&self, actual_name: &str) -> Option<&MemberDef> {
        self.members
            .iter()
            .find(|member| member.actual_name().eq_ignore_ascii_case(actual_name))
    }

    /// The actual name of the member implementing `interface_member`.
    /// Defaults to the interface member's own name.
    #[must_use]
    pub fn implementing_member(&self, interface: &TypeName, interface_member: &str) -> String {
        self.implementations
            .get(interface)
            .and_then(|map| map.get(&interface_member.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| interface_member.to_string())
    }

    #[must_use]
    pub fn constructor_def(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    // ── Capabilities ─────────────────────────────────────────────

    #[must_use]
    pub fn has_dynamic_members(&self) -> bool {
        self.dynamic.is_some()
    }

    #[must_use]
    pub fn has_map_tail(&self) -> bool {
        self.map_tail.is_some()
    }

    /// Queries the dynamic-member protocol of `target`.
    #[must_use]
    pub fn try_get_member(&self, target: &Object, name: &str) -> Option<(String, Value)> {
        let dynamic = self.dynamic.as_ref()?;
        target.read(|state| dynamic.try_get(state, name))
    }

    /// Writes through the dynamic-member protocol of `target`.
    pub fn try_set_member(&self, target: &Object, name: &str, value: Value) -> bool {
        match &self.dynamic {
            Some(dynamic) => target.write(|state| dynamic.try_set(state, name, value)),
            None => false,
        }
    }

    /// Case-insensitive lookup in the map tail of `target`.
    #[must_use]
    pub fn tail_find(&self, target: &Object, name: &str) -> Option<(String, Value)> {
        let tail = self.map_tail.as_ref()?;
        target.read(|state| tail.find(state, name))
    }

    /// Writes into the map tail of `target`, returning the stored key.
    pub fn tail_set(&self, target: &Object, name: &str, value: Value) -> Option<String> {
        let tail = self.map_tail.as_ref()?;
        target.write(|state| tail.set(state, name, value))
    }

    /// Entries of the map tail of `target`, in insertion order.
    #[must_use]
    pub fn tail_entries(&self, target: &Object) -> Vec<(String, Value)> {
        match &self.map_tail {
            Some(tail) => target.read(|state| tail.entries(state)),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("interfaces", &self.interfaces)
            .field("members", &self.members)
            .field("constructor", &self.constructor)
            .field("dynamic_members", &self.dynamic.is_some())
            .field("map_tail", &self.map_tail.is_some())
            .finish()
    }
}
