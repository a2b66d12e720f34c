//! Parsing and caching of terms.

use crate::config::MetaConfig;
use crate::error::{MetaError, MetaResult};
use crate::property::{DynamicProperty, IndexPosition, IndexProperty, Property};
use crate::term::Term;
use crate::type_cache::TypeCache;
use dashmap::DashMap;
use resmeta_types::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// How a term component is bound to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRule {
    /// Declared member if there is one, otherwise dynamic.
    DeclaredWithDynamicFallback,
    /// Declared member, or an error. A member declared only on a subclass
    /// of the running type binds dynamically instead.
    OnlyDeclared,
    /// Always dynamic, resolving to a declared member when no dynamic one matches.
    DynamicWithDeclaredFallback,
}

/// Component names that always bind dynamically, whatever the rule.
#[derive(Debug, Clone, Default)]
pub struct DynamicDomain(HashSet<String>);

impl DynamicDomain {
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TermKey {
    root: String,
    key: String,
    separator: String,
    binding: BindingRule,
}

/// Parses dotted paths into terms and memoizes them.
///
/// Cached entries are inserted at most once per key and never evicted.
pub struct TermFactory {
    types: Arc<TypeCache>,
    separator: String,
    condition_binding: BindingRule,
    output_binding: BindingRule,
    cache: DashMap<TermKey, Arc<Term>>,
}

impl TermFactory {
    #[must_use]
    pub fn new(types: Arc<TypeCache>, config: &MetaConfig) -> Self {
        Self {
            types,
            separator: config.separator.clone(),
            condition_binding: config.condition_binding,
            output_binding: config.output_binding,
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    /// Parses `key` without consulting the cache.
    pub fn parse(
        &self,
        root: &ValueType,
        key: &str,
        separator: &str,
        binding: BindingRule,
        dynamic_domain: Option<&DynamicDomain>,
    ) -> MetaResult<Term> {
        parse_term(&self.types, root, key, separator, binding, dynamic_domain)
    }

    /// Returns the cached term for `(root, key, separator, binding)`,
    /// parsing it on first use. Keys compare ignoring case.
    pub fn make_or_get_cached_term(
        &self,
        root: &ValueType,
        key: &str,
        separator: &str,
        binding: BindingRule,
    ) -> MetaResult<Arc<Term>> {
        let cache_key = TermKey {
            root: root.to_string(),
            key: key.to_lowercase(),
            separator: separator.to_string(),
            binding,
        };
        let cached = self.cache.get(&cache_key).map(|term| Arc::clone(term.value()));
        if let Some(term) = cached {
            return Ok(term);
        }

        trace!(root = %root, key, ?binding, "term cache miss");
        let term = Arc::new(self.parse(root, key, separator, binding, None)?);
        let term = Arc::clone(self.cache.entry(cache_key).or_insert(term).value());
        Ok(term)
    }

    /// Cached unless a dynamic domain is given; a domain changes the parse
    /// outcome, so those terms are always built fresh.
    pub fn make_term(
        &self,
        root: &ValueType,
        key: &str,
        separator: &str,
        binding: BindingRule,
        dynamic_domain: Option<&DynamicDomain>,
    ) -> MetaResult<Arc<Term>> {
        match dynamic_domain {
            Some(domain) => self
                .parse(root, key, separator, binding, Some(domain))
                .map(Arc::new),
            None => self.make_or_get_cached_term(root, key, separator, binding),
        }
    }

    /// A term for the condition layer, bound with the configured condition rule.
    pub fn make_condition_term(
        &self,
        root: &ValueType,
        key: &str,
        dynamic_domain: Option<&DynamicDomain>,
    ) -> MetaResult<Arc<Term>> {
        self.make_term(root, key, &self.separator, self.condition_binding, dynamic_domain)
    }

    /// A term for output shaping, bound with the configured output rule.
    pub fn make_output_term(
        &self,
        root: &ValueType,
        key: &str,
        dynamic_domain: Option<&DynamicDomain>,
    ) -> MetaResult<Arc<Term>> {
        self.make_term(root, key, &self.separator, self.output_binding, dynamic_domain)
    }

    /// Number of cached terms.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Splits `key` on `separator` and binds each component against the
/// running type: `root` for the first, the previous component's value
/// type afterwards.
pub(crate) fn parse_term(
    types: &TypeCache,
    root: &ValueType,
    key: &str,
    separator: &str,
    binding: BindingRule,
    dynamic_domain: Option<&DynamicDomain>,
) -> MetaResult<Term> {
    if key.is_empty() || separator.is_empty() {
        return Err(MetaError::InvalidOperation(format!(
            "cannot parse term '{key}' with separator '{separator}'"
        )));
    }
    let mut running = root.clone();
    let mut store = Vec::new();
    for name in key.split(separator) {
        if name.is_empty() {
            return Err(MetaError::InvalidOperation(format!(
                "term '{key}' has an empty component"
            )));
        }
        let property = bind_component(types, &running, name, binding, dynamic_domain)?;
        running = property.value_type().clone();
        store.push(property);
    }
    Ok(Term::from_properties(store).with_separator(separator))
}

fn bind_component(
    types: &TypeCache,
    running: &ValueType,
    name: &str,
    binding: BindingRule,
    dynamic_domain: Option<&DynamicDomain>,
) -> MetaResult<Property> {
    if dynamic_domain.is_some_and(|domain| domain.contains(name)) {
        return Ok(DynamicProperty::new(name, false).into());
    }
    if let (Some(element), Some(position)) = (
        running.underlying().is_sequence().then(|| running.element_type()).flatten(),
        IndexPosition::parse(name),
    ) {
        return Ok(IndexProperty::new(position, element.clone()).into());
    }
    match binding {
        BindingRule::DeclaredWithDynamicFallback => match types.find_declared(running, name) {
            Ok(property) => Ok(property.into()),
            Err(MetaError::UnknownProperty { .. }) => Ok(DynamicProperty::new(name, true).into()),
            Err(other) => Err(other),
        },
        BindingRule::OnlyDeclared => match types.find_declared(running, name) {
            Ok(property) => Ok(property.into()),
            Err(MetaError::UnknownProperty { type_name, property }) => {
                if types.declared_on_subclass(running, name)? {
                    Ok(DynamicProperty::new(name, true).into())
                } else {
                    Err(MetaError::UnknownProperty {
                        type_name,
                        property,
                    })
                }
            }
            Err(other) => Err(other),
        },
        BindingRule::DynamicWithDeclaredFallback => Ok(DynamicProperty::new(name, true).into()),
    }
}
