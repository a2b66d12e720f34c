//! Discovery and caching of the declared members of model types.

use crate::error::{MetaError, MetaResult};
use crate::property::DeclaredProperty;
use crate::term_factory::{BindingRule, parse_term};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use resmeta_model::{Creator, MemberDef, TypeDef, TypeKind, TypeRegistry};
use resmeta_types::{TypeName, ValueType};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tracing::debug;

/// The declared surface of one model type.
pub struct EntityTypeContract {
    entity_type: TypeName,
    properties: Vec<Arc<DeclaredProperty>>,
    creator: RwLock<Option<Creator>>,
}

impl EntityTypeContract {
    #[must_use]
    pub fn entity_type(&self) -> &TypeName {
        &self.entity_type
    }

    /// Declared properties in exposure order.
    #[must_use]
    pub fn properties(&self) -> &[Arc<DeclaredProperty>] {
        &self.properties
    }

    /// Finds a property by exposed name, exact case first.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<DeclaredProperty>> {
        self.properties
            .iter()
            .find(|p| p.name() == name)
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| p.name().eq_ignore_ascii_case(name))
            })
    }

    /// Custom instance factory, consulted before the registered constructors.
    #[must_use]
    pub fn creator(&self) -> Option<Creator> {
        self.creator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_creator(&self, creator: Creator) {
        *self.creator.write().unwrap_or_else(PoisonError::into_inner) = Some(creator);
    }
}

impl fmt::Debug for EntityTypeContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTypeContract")
            .field("entity_type", &self.entity_type)
            .field("properties", &self.properties)
            .field("has_creator", &self.creator().is_some())
            .finish()
    }
}

/// Per-type cache of [`EntityTypeContract`]s.
///
/// A contract is computed on first request and kept for the life of the
/// cache. Other threads never observe a contract before its defines are
/// wired, and discovery failures leave no entry behind.
pub struct TypeCache {
    registry: Arc<TypeRegistry>,
    contracts: DashMap<TypeName, Arc<EntityTypeContract>>,
    /// Contracts whose defines are being wired, visible to their own thread.
    building: DashMap<(TypeName, ThreadId), Arc<EntityTypeContract>>,
    by_actual_name: DashMap<(TypeName, String), Arc<DeclaredProperty>>,
}

impl TypeCache {
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            contracts: DashMap::new(),
            building: DashMap::new(),
            by_actual_name: DashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Number of types discovered so far.
    #[must_use]
    pub fn cached_types(&self) -> usize {
        self.contracts.len()
    }

    /// Returns the contract of `type_name`, discovering it on first use.
    ///
    /// A contract is published only after its `defines` terms are wired.
    /// While wiring, the discovering thread sees its own unpublished
    /// contract, so defines may refer back to the type being discovered.
    pub fn contract(&self, type_name: &TypeName) -> MetaResult<Arc<EntityTypeContract>> {
        let cached = self
            .contracts
            .get(type_name)
            .map(|contract| Arc::clone(contract.value()));
        if let Some(contract) = cached {
            return Ok(contract);
        }
        let building_key = (type_name.clone(), thread::current().id());
        let building = self
            .building
            .get(&building_key)
            .map(|contract| Arc::clone(contract.value()));
        if let Some(contract) = building {
            return Ok(contract);
        }

        let def = self
            .registry
            .get(type_name.as_str())
            .ok_or_else(|| MetaError::UnknownType(type_name.to_string()))?;
        let properties = self.discover(def);
        debug!(
            type_name = %type_name,
            count = properties.len(),
            "discovered declared properties"
        );

        let contract = Arc::new(EntityTypeContract {
            entity_type: type_name.clone(),
            properties,
            creator: RwLock::new(None),
        });
        self.building.insert(building_key.clone(), Arc::clone(&contract));
        let wired = self.wire_defines(&contract);
        self.building.remove(&building_key);
        wired?;

        match self.contracts.entry(type_name.clone()) {
            Entry::Occupied(winner) => Ok(Arc::clone(winner.get())),
            Entry::Vacant(slot) => {
                for property in contract.properties() {
                    self.by_actual_name.insert(
                        (type_name.clone(), property.actual_name().to_lowercase()),
                        Arc::clone(property),
                    );
                }
                slot.insert(Arc::clone(&contract));
                Ok(contract)
            }
        }
    }

    /// Declared properties of `value_type`. Nullable types delegate to the
    /// underlying type; non-object types have none.
    pub fn declared_properties(
        &self,
        value_type: &ValueType,
    ) -> MetaResult<Vec<Arc<DeclaredProperty>>> {
        match value_type.object_name() {
            Some(name) => Ok(self.contract(name)?.properties().to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Finds a declared property by exposed name, exact case first.
    pub fn find_declared(
        &self,
        value_type: &ValueType,
        name: &str,
    ) -> MetaResult<Arc<DeclaredProperty>> {
        let unknown = || MetaError::UnknownProperty {
            type_name: value_type.to_string(),
            property: name.to_string(),
        };
        let type_name = value_type.object_name().ok_or_else(unknown)?;
        self.contract(type_name)?
            .property(name)
            .cloned()
            .ok_or_else(unknown)
    }

    /// Reverse lookup by backing member name, ignoring case.
    pub fn find_by_actual_name(
        &self,
        type_name: &TypeName,
        actual_name: &str,
    ) -> MetaResult<Option<Arc<DeclaredProperty>>> {
        self.contract(type_name)?;
        Ok(self
            .by_actual_name
            .get(&(type_name.clone(), actual_name.to_lowercase()))
            .map(|property| Arc::clone(property.value())))
    }

    /// True if some registered subclass of `value_type` declares `name`.
    pub fn declared_on_subclass(&self, value_type: &ValueType, name: &str) -> MetaResult<bool> {
        let Some(type_name) = value_type.object_name() else {
            return Ok(false);
        };
        for subclass in self.registry.subclasses_of(type_name.as_str()) {
            if self.contract(subclass.name())?.property(name).is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ── Discovery ────────────────────────────────────────────────

    fn discover(&self, def: &Arc<TypeDef>) -> Vec<Arc<DeclaredProperty>> {
        let owner = def.name();
        let attributes = def.type_attributes();

        let mut properties: Vec<DeclaredProperty> = if attributes.ignore_members {
            Vec::new()
        } else if def.kind() == TypeKind::Interface {
            self.interface_members(def.name())
                .into_iter()
                .map(|(iface, member)| {
                    DeclaredProperty::interface_member(owner, &iface, &member, &self.registry)
                })
                .collect()
        } else if let Some(surface) = &attributes.interface_surface {
            self.surfaced_members(def, surface)
        } else if let Some(terminal) = self.registry.terminal_ancestor(owner.as_str()) {
            self.below_terminal(def, &terminal)
                .iter()
                .map(|member| DeclaredProperty::from_member(owner, member, &self.registry))
                .collect()
        } else if let Some(viewed) = &attributes.view_of {
            let mut members = self.class_members(def);
            if let Some(viewed) = self.registry.get(viewed.as_str()) {
                members.extend(self.class_members(viewed));
            }
            dedup_by_name(members)
                .iter()
                .map(|member| DeclaredProperty::from_member(owner, member, &self.registry))
                .collect()
        } else {
            dedup_by_name(self.class_members(def))
                .iter()
                .map(|member| DeclaredProperty::from_member(owner, member, &self.registry))
                .collect()
        };

        properties.sort_by_key(|p| (p.order().is_none(), p.order()));
        properties.into_iter().map(Arc::new).collect()
    }

    /// Own members followed by inherited ones, nearest base first.
    fn class_members(&self, def: &Arc<TypeDef>) -> Vec<MemberDef> {
        self.registry
            .member_chain(def.name().as_str())
            .into_iter()
            .flat_map(|(_, members)| members)
            .filter(|member| !member.property_attributes().ignore)
            .collect()
    }

    /// Members of `interface` and every interface it extends, each paired
    /// with its declaring interface.
    fn interface_members(&self, interface: &TypeName) -> Vec<(TypeName, MemberDef)> {
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        let mut queue = VecDeque::from([interface.clone()]);
        let mut members = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(def) = self.registry.get(current.as_str()) else {
                continue;
            };
            for member in def.members() {
                if member.property_attributes().ignore {
                    continue;
                }
                if names.insert(member.name().to_lowercase()) {
                    members.push((current.clone(), member.clone()));
                }
            }
            queue.extend(def.interfaces().iter().cloned());
        }
        members
    }

    /// Interface members exposed under their interface names but bound to
    /// the concrete members the interface delegates to.
    fn surfaced_members(&self, def: &Arc<TypeDef>, surface: &TypeName) -> Vec<DeclaredProperty> {
        let concrete = self.class_members(def);
        self.interface_members(surface)
            .into_iter()
            .map(|(declaring, member)| {
                let mut actual = def.implementing_member(&declaring, member.name());
                if actual == member.name() && declaring != *surface {
                    actual = def.implementing_member(surface, member.name());
                }
                let implementation = concrete
                    .iter()
                    .find(|candidate| candidate.actual_name().eq_ignore_ascii_case(&actual));
                DeclaredProperty::surfaced(def.name(), &member, implementation, &self.registry)
            })
            .collect()
    }

    /// Members declared between `def` and its terminal base, excluding any
    /// name the terminal chain already declares.
    fn below_terminal(&self, def: &Arc<TypeDef>, terminal: &TypeName) -> Vec<MemberDef> {
        let hidden: HashSet<String> = self
            .registry
            .get(terminal.as_str())
            .map(|terminal| self.class_members(terminal))
            .unwrap_or_default()
            .iter()
            .map(|member| member.name().to_lowercase())
            .collect();
        let members = self
            .registry
            .member_chain(def.name().as_str())
            .into_iter()
            .take_while(|(level, _)| level.name() != terminal)
            .flat_map(|(_, members)| members)
            .filter(|member| !member.property_attributes().ignore)
            .filter(|member| !hidden.contains(&member.name().to_lowercase()))
            .collect();
        dedup_by_name(members)
    }

    fn wire_defines(&self, contract: &EntityTypeContract) -> MetaResult<()> {
        let owner = ValueType::Object(contract.entity_type().clone());
        for property in contract.properties() {
            if property.defines().is_empty() {
                continue;
            }
            let terms = property
                .defines()
                .iter()
                .map(|key| {
                    parse_term(self, &owner, key, ".", BindingRule::OnlyDeclared, None)
                        .map(Arc::new)
                })
                .collect::<MetaResult<Vec<_>>>()?;
            property.set_defines_property_terms(terms);
        }
        Ok(())
    }
}

/// Keeps the first member of each name, ignoring case.
fn dedup_by_name(members: Vec<MemberDef>) -> Vec<MemberDef> {
    let mut seen = HashSet::new();
    members
        .into_iter()
        .filter(|member| seen.insert(member.name().to_lowercase()))
        .collect()
}
