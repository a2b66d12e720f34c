//! Change monitoring over the reachable declared properties of a type.

use crate::error::MetaResult;
use crate::property::{
    DeclaredProperty, IndexPosition, IndexProperty, ListenerId, Observed, Property,
    PropertyChanged,
};
use crate::term::Term;
use crate::type_cache::TypeCache;
use resmeta_types::{Object, TypeName, Value, ValueType};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// A change reported by a [`PropertyMonitoringTree`].
#[derive(Debug, Clone)]
pub struct TermChange {
    /// Path from the monitored root to the changed value.
    pub term: Arc<Term>,
    /// `term` rendered with the tree's separator.
    pub key: String,
    /// The object the changed property belongs to.
    pub target: Object,
    pub old_value: Observed,
    pub new_value: Observed,
}

pub type ChangeHandler = Arc<dyn Fn(&TermChange) + Send + Sync>;

#[derive(Debug, Clone)]
pub enum LinkKind {
    Property(Arc<DeclaredProperty>),
    /// Stands for every element of a sequence.
    AnyIndex,
}

/// One node of a monitoring tree.
pub struct PropertyLink {
    rootward: Option<usize>,
    kind: LinkKind,
    term_from_root: Arc<Term>,
    has_unresolved_indexes: bool,
    /// Terms defined by the property: (relative to its owner, from the root).
    dependents: Vec<(Arc<Term>, Arc<Term>)>,
    subscription: Option<ListenerId>,
}

impl PropertyLink {
    /// Index of the parent link in [`PropertyMonitoringTree::links`].
    #[must_use]
    pub fn rootward(&self) -> Option<usize> {
        self.rootward
    }

    #[must_use]
    pub fn kind(&self) -> &LinkKind {
        &self.kind
    }

    #[must_use]
    pub fn property(&self) -> Option<&Arc<DeclaredProperty>> {
        match &self.kind {
            LinkKind::Property(property) => Some(property),
            LinkKind::AnyIndex => None,
        }
    }

    #[must_use]
    pub fn term_from_root(&self) -> &Arc<Term> {
        &self.term_from_root
    }

    #[must_use]
    pub fn has_unresolved_indexes(&self) -> bool {
        self.has_unresolved_indexes
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    fn activate(&mut self, types: &Arc<TypeCache>, separator: &str, handler: &ChangeHandler) {
        let LinkKind::Property(property) = &self.kind else {
            return;
        };
        if self.subscription.is_some() {
            return;
        }
        let term = Arc::clone(&self.term_from_root);
        let key = term.render(separator);
        let dependents: Vec<(Arc<Term>, Arc<Term>, String)> = self
            .dependents
            .iter()
            .map(|(relative, from_root)| {
                (
                    Arc::clone(relative),
                    Arc::clone(from_root),
                    from_root.render(separator),
                )
            })
            .collect();
        let types: Weak<TypeCache> = Arc::downgrade(types);
        let handler = Arc::clone(handler);

        let id = property.subscribe(Arc::new(move |change: &PropertyChanged<'_>| {
            handler(&TermChange {
                term: Arc::clone(&term),
                key: key.clone(),
                target: change.target.clone(),
                old_value: change.old_value.clone(),
                new_value: Observed::Known(change.new_value.clone()),
            });
            if dependents.is_empty() {
                return;
            }
            let Some(types) = types.upgrade() else {
                return;
            };
            let target = Value::Object(change.target.clone());
            for (relative, from_root, key) in &dependents {
                let new_value = relative
                    .get_value_now(&types, &target)
                    .map_or(Observed::Unknown, Observed::Known);
                handler(&TermChange {
                    term: Arc::clone(from_root),
                    key: key.clone(),
                    target: change.target.clone(),
                    old_value: Observed::Unknown,
                    new_value,
                });
            }
        }));
        self.subscription = Some(id);
    }

    fn deactivate(&mut self) {
        if let (LinkKind::Property(property), Some(id)) = (&self.kind, self.subscription.take()) {
            property.unsubscribe(id);
        }
    }
}

impl fmt::Debug for PropertyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyLink")
            .field("term_from_root", &self.term_from_root.key())
            .field("rootward", &self.rootward)
            .field("has_unresolved_indexes", &self.has_unresolved_indexes)
            .field("active", &self.is_active())
            .finish()
    }
}

/// The reachable declared-property graph of a root type, subscribed to
/// every property in it.
///
/// Each type is expanded at most once per tree, so cyclic type graphs
/// terminate. A type reachable along several paths is only monitored
/// along the first one found.
pub struct PropertyMonitoringTree {
    root: TypeName,
    separator: String,
    links: Vec<PropertyLink>,
}

impl PropertyMonitoringTree {
    /// Builds the tree depth first and activates every link.
    ///
    /// Types in `stub` count as already visited and are not expanded.
    pub fn new(
        types: &Arc<TypeCache>,
        root: &TypeName,
        separator: &str,
        stub: &[TypeName],
        handler: ChangeHandler,
    ) -> MetaResult<Self> {
        let mut tree = Self {
            root: root.clone(),
            separator: separator.to_string(),
            links: Vec::new(),
        };
        let mut visited: HashSet<TypeName> = stub.iter().cloned().collect();
        tree.expand(
            types,
            &ValueType::Object(root.clone()),
            None,
            &[],
            &mut visited,
        )?;
        for link in &mut tree.links {
            link.activate(types, separator, &handler);
        }
        debug!(root = %root, links = tree.links.len(), "monitoring tree built");
        Ok(tree)
    }

    fn expand(
        &mut self,
        types: &TypeCache,
        value_type: &ValueType,
        rootward: Option<usize>,
        prefix: &[Property],
        visited: &mut HashSet<TypeName>,
    ) -> MetaResult<()> {
        if value_type.is_sequence() {
            let Some(element) = value_type.element_type() else {
                return Ok(());
            };
            let index = Property::from(IndexProperty::new(IndexPosition::Any, element.clone()));
            let store = extend(prefix, index);
            let term =
                Arc::new(Term::from_properties(store.clone()).with_separator(&self.separator));
            self.links.push(PropertyLink {
                rootward,
                kind: LinkKind::AnyIndex,
                has_unresolved_indexes: term.has_unresolved_indexes(),
                term_from_root: term,
                dependents: Vec::new(),
                subscription: None,
            });
            let here = self.links.len() - 1;
            return self.expand(types, element, Some(here), &store, visited);
        }

        let Some(type_name) = value_type.object_name() else {
            return Ok(());
        };
        if !visited.insert(type_name.clone()) {
            return Ok(());
        }
        for property in types.declared_properties(value_type)? {
            let store = extend(prefix, Property::Declared(Arc::clone(&property)));
            let term =
                Arc::new(Term::from_properties(store.clone()).with_separator(&self.separator));
            let dependents = property
                .defines_property_terms()
                .iter()
                .map(|relative| {
                    let mut from_root = prefix.to_vec();
                    from_root.extend(relative.properties().iter().cloned());
                    (
                        Arc::clone(relative),
                        Arc::new(
                            Term::from_properties(from_root).with_separator(&self.separator),
                        ),
                    )
                })
                .collect();
            self.links.push(PropertyLink {
                rootward,
                kind: LinkKind::Property(Arc::clone(&property)),
                has_unresolved_indexes: term.has_unresolved_indexes(),
                term_from_root: term,
                dependents,
                subscription: None,
            });
            let here = self.links.len() - 1;
            self.expand(types, property.value_type(), Some(here), &store, visited)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> &TypeName {
        &self.root
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Links in depth-first discovery order.
    #[must_use]
    pub fn links(&self) -> &[PropertyLink] {
        &self.links
    }

    /// Finds a link by its key from the root, ignoring case.
    #[must_use]
    pub fn link(&self, key: &str) -> Option<&PropertyLink> {
        self.links.iter().find(|link| {
            link.term_from_root
                .render(&self.separator)
                .eq_ignore_ascii_case(key)
        })
    }

    /// Unsubscribes every link. The tree reports nothing afterwards.
    pub fn dispose(&mut self) {
        let active = self.links.iter().filter(|link| link.is_active()).count();
        if active == 0 {
            return;
        }
        for link in &mut self.links {
            link.deactivate();
        }
        debug!(root = %self.root, links = active, "monitoring tree disposed");
    }
}

impl Drop for PropertyMonitoringTree {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PropertyMonitoringTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMonitoringTree")
            .field("root", &self.root)
            .field("links", &self.links)
            .finish()
    }
}

fn extend(prefix: &[Property], next: Property) -> Vec<Property> {
    let mut store = Vec::with_capacity(prefix.len() + 1);
    store.extend(prefix.iter().cloned());
    store.push(next);
    store
}
