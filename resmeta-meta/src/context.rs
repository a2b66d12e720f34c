//! The engine's cache service.

use crate::config::MetaConfig;
use crate::error::MetaResult;
use crate::monitoring::{ChangeHandler, PropertyMonitoringTree};
use crate::populator::{Populator, build_value};
use crate::serialization::SerializationMetadata;
use crate::term_factory::TermFactory;
use crate::type_cache::TypeCache;
use dashmap::DashMap;
use resmeta_model::TypeRegistry;
use resmeta_types::{PopulateSource, TypeName, Value, ValueType};
use std::sync::Arc;
use tracing::debug;

/// Owns every cache the engine keeps: declared properties per type,
/// parsed terms, and serialization metadata.
///
/// Create one at startup and share it. Nothing is ever evicted.
pub struct MetaContext {
    config: MetaConfig,
    types: Arc<TypeCache>,
    terms: TermFactory,
    metadata: DashMap<ValueType, Arc<SerializationMetadata>>,
}

impl MetaContext {
    #[must_use]
    pub fn new(registry: TypeRegistry, config: MetaConfig) -> Arc<Self> {
        Self::with_registry(Arc::new(registry), config)
    }

    #[must_use]
    pub fn with_registry(registry: Arc<TypeRegistry>, config: MetaConfig) -> Arc<Self> {
        debug!(types = registry.len(), separator = %config.separator, "meta context created");
        let types = Arc::new(TypeCache::new(registry));
        Arc::new(Self {
            terms: TermFactory::new(Arc::clone(&types), &config),
            types,
            config,
            metadata: DashMap::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &MetaConfig {
        &self.config
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    #[must_use]
    pub fn terms(&self) -> &TermFactory {
        &self.terms
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.types.registry()
    }

    /// Cached serialization metadata for `value_type`.
    pub fn serialization_metadata(
        &self,
        value_type: &ValueType,
    ) -> MetaResult<Arc<SerializationMetadata>> {
        let cached = self
            .metadata
            .get(value_type)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(metadata) = cached {
            return Ok(metadata);
        }
        let fresh = Arc::new(SerializationMetadata::new(&self.types, value_type)?);
        Ok(Arc::clone(
            self.metadata
                .entry(value_type.clone())
                .or_insert(fresh)
                .value(),
        ))
    }

    /// Compiles a populator for `source` onto values of `target_type`.
    pub fn populator(
        &self,
        target_type: &ValueType,
        source: &PopulateSource,
    ) -> MetaResult<Populator> {
        Populator::compile(self, target_type, source)
    }

    /// Merges `source` onto `target`, compiling against its runtime type.
    pub async fn populate(&self, target: &Value, source: &PopulateSource) -> MetaResult<()> {
        self.populator(&target.runtime_type(), source)?
            .populate(self, target)
            .await
    }

    /// Builds a new value of `value_type` from `source`.
    pub async fn create(&self, value_type: &ValueType, source: &PopulateSource) -> MetaResult<Value> {
        build_value(self, value_type, source).await
    }

    /// Reads the output term `key` from `target`, binding against the
    /// target's runtime type.
    pub async fn get_value(&self, target: &Value, key: &str) -> MetaResult<Value> {
        let term = self
            .terms
            .make_output_term(&target.runtime_type(), key, None)?;
        Ok(term.get_value(&self.types, target).await)
    }

    /// Monitors every declared property reachable from `root`.
    pub fn monitor(
        &self,
        root: &TypeName,
        handler: ChangeHandler,
    ) -> MetaResult<PropertyMonitoringTree> {
        self.monitor_with_stub(root, &[], handler)
    }

    /// Like [`monitor`](Self::monitor), leaving the types in `stub` unexpanded.
    pub fn monitor_with_stub(
        &self,
        root: &TypeName,
        stub: &[TypeName],
        handler: ChangeHandler,
    ) -> MetaResult<PropertyMonitoringTree> {
        PropertyMonitoringTree::new(&self.types, root, &self.config.separator, stub, handler)
    }
}
