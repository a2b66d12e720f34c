//! The set of registered model types.

use crate::member::MemberDef;
use crate::projection::StateProjection;
use crate::type_def::TypeDef;
use resmeta_types::TypeName;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Immutable-after-setup registry of model types.
///
/// Built once at startup and then shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeName, Arc<TypeDef>>,
    /// Registration order, for deterministic subclass enumeration.
    order: Vec<TypeName>,
    terminal_bases: HashSet<TypeName>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type, replacing any earlier definition of the same name.
    pub fn register(&mut self, def: TypeDef) -> &mut Self {
        let name = def.name().clone();
        if self.types.insert(name.clone(), Arc::new(def)).is_some() {
            warn!(type_name = %name, "type registered twice, keeping the latest definition");
        } else {
            self.order.push(name);
        }
        self
    }

    /// Marks a base type as terminal: subtypes expose only the members
    /// they declare below it.
    pub fn terminal_base(&mut self, name: impl Into<TypeName>) -> &mut Self {
        self.terminal_bases.insert(name.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    #[must_use]
    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminal_bases.contains(name)
    }

    /// Base types of `name`, nearest first. Unregistered bases end the chain.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<Arc<TypeDef>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(name).and_then(|def| def.base_type().cloned());
        while let Some(base) = current {
            if !seen.insert(base.clone()) {
                break;
            }
            let Some(def) = self.get(base.as_str()) else {
                break;
            };
            current = def.base_type().cloned();
            chain.push(Arc::clone(def));
        }
        chain
    }

    /// Members of `name` followed by those of each base, nearest first.
    ///
    /// Base members are projected onto the state of `name` through the
    /// embedded-base projections along the chain, so their accessors work
    /// on instances of `name`.
    #[must_use]
    pub fn member_chain(&self, name: &str) -> Vec<(Arc<TypeDef>, Vec<MemberDef>)> {
        let Some(def) = self.get(name) else {
            return Vec::new();
        };
        let mut chain = vec![(Arc::clone(def), def.members().to_vec())];
        let mut projection: Option<StateProjection> = None;
        let mut below = Arc::clone(def);
        for base in self.ancestors(name) {
            projection = match (projection, below.base_projection()) {
                (None, step) => step.cloned(),
                (Some(acc), Some(step)) => Some(acc.then(step)),
                (Some(acc), None) => Some(acc),
            };
            let members = match &projection {
                Some(projection) => base
                    .members()
                    .iter()
                    .map(|member| member.project(projection))
                    .collect(),
                None => base.members().to_vec(),
            };
            chain.push((Arc::clone(&base), members));
            below = base;
        }
        chain
    }

    /// Nearest terminal base of `name`, if any.
    #[must_use]
    pub fn terminal_ancestor(&self, name: &str) -> Option<TypeName> {
        self.ancestors(name)
            .into_iter()
            .map(|def| def.name().clone())
            .find(|base| self.is_terminal(base.as_str()))
    }

    /// Returns true if `ancestor` is a (transitive) base of `child`.
    #[must_use]
    pub fn is_subclass_of(&self, child: &str, ancestor: &str) -> bool {
        self.ancestors(child)
            .iter()
            .any(|def| def.name().as_str() == ancestor)
    }

    /// Returns true if an instance of `child` may be stored where `target`
    /// is expected: the same type, a subclass, or an implementor of the
    /// `target` interface through any base or extended interface.
    #[must_use]
    pub fn is_assignable(&self, child: &str, target: &str) -> bool {
        if child == target {
            return true;
        }
        let mut pending = Vec::new();
        for def in self.get(child).cloned().into_iter().chain(self.ancestors(child)) {
            if def.name().as_str() == target {
                return true;
            }
            pending.extend(def.interfaces().iter().cloned());
        }
        let mut seen = HashSet::new();
        while let Some(interface) = pending.pop() {
            if interface.as_str() == target {
                return true;
            }
            if !seen.insert(interface.clone()) {
                continue;
            }
            if let Some(def) = self.get(interface.as_str()) {
                pending.extend(def.interfaces().iter().cloned());
            }
        }
        false
    }

    /// All registered (transitive) subclasses of `name`.
    #[must_use]
    pub fn subclasses_of(&self, name: &str) -> Vec<Arc<TypeDef>> {
        self.types()
            .filter(|def| self.is_subclass_of(def.name().as_str(), name))
            .cloned()
            .collect()
    }
}
