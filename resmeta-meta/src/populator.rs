//! Compiled population of object graphs from [`PopulateSource`] trees.
//!
//! A [`Populator`] is compiled once for a `(target type, source)` pair and
//! can then be applied to any number of targets of that type. Existing
//! nested instances are merged into in place; new instances are only
//! built where a member is null or must be replaced.

use crate::config::NullPolicy;
use crate::context::MetaContext;
use crate::error::{MetaError, MetaResult};
use crate::property::{DeclaredProperty, DynamicProperty};
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use resmeta_types::{PopulateSource, SharedList, SharedMap, Value, ValueType};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A value to assign, either fixed at compile time or built per target.
enum Prepared {
    Constant(Value),
    Build(PopulateSource),
}

enum PopulatorAction {
    /// Assigns a value, discarding whatever the member held.
    DirectSet {
        property: Arc<DeclaredProperty>,
        value: Prepared,
    },
    /// Merges onto the existing nested instance, or builds one if null.
    Merge {
        property: Arc<DeclaredProperty>,
        source: PopulateSource,
        nested: Arc<Populator>,
    },
    /// Like `Merge`, for members typed `Any`: the nested populator is
    /// chosen by the runtime type of the existing value.
    DynamicMerge {
        property: Arc<DeclaredProperty>,
        source: PopulateSource,
        compiled: DashMap<ValueType, Arc<Populator>>,
    },
}

impl PopulatorAction {
    fn property(&self) -> &Arc<DeclaredProperty> {
        match self {
            Self::DirectSet { property, .. }
            | Self::Merge { property, .. }
            | Self::DynamicMerge { property, .. } => property,
        }
    }

    async fn apply(&self, ctx: &MetaContext, target: &Value) -> MetaResult<()> {
        match self {
            Self::DirectSet { property, value } => {
                let value = match value {
                    Prepared::Constant(value) => value.clone(),
                    Prepared::Build(source) => {
                        build_value(ctx, property.value_type(), source).await?
                    }
                };
                property.set_value(target, value)
            }
            Self::Merge {
                property,
                source,
                nested,
            } => {
                let existing = property.get_value(target).await;
                if existing.is_null() {
                    assign_fresh(ctx, property, target, source).await
                } else {
                    nested.populate(ctx, &existing).await
                }
            }
            Self::DynamicMerge {
                property,
                source,
                compiled,
            } => {
                let existing = property.get_value(target).await;
                if existing.is_null() {
                    return assign_fresh(ctx, property, target, source).await;
                }
                let runtime_type = existing.runtime_type();
                let cached = compiled
                    .get(&runtime_type)
                    .map(|entry| Arc::clone(entry.value()));
                let nested = match cached {
                    Some(nested) => nested,
                    None => {
                        let fresh = Arc::new(Populator::compile(ctx, &runtime_type, source)?);
                        Arc::clone(compiled.entry(runtime_type).or_insert(fresh).value())
                    }
                };
                nested.populate(ctx, &existing).await
            }
        }
    }
}

async fn assign_fresh(
    ctx: &MetaContext,
    property: &DeclaredProperty,
    target: &Value,
    source: &PopulateSource,
) -> MetaResult<()> {
    if !property.is_writable() {
        return Ok(());
    }
    let value = build_value(ctx, property.value_type(), source).await?;
    property.set_value(target, value)
}

/// A compiled set of assignments for one target type and source shape.
pub struct Populator {
    target_type: ValueType,
    actions: Vec<PopulatorAction>,
    /// Source entries bound to no declared member.
    tail: Vec<(String, PopulateSource)>,
    tail_populators: DashMap<(String, ValueType), Arc<Populator>>,
}

impl Populator {
    /// A populator that changes nothing.
    #[must_use]
    pub fn empty(target_type: ValueType) -> Self {
        Self {
            target_type,
            actions: Vec::new(),
            tail: Vec::new(),
            tail_populators: DashMap::new(),
        }
    }

    /// Compiles the actions that merge `source` onto values of `target_type`.
    ///
    /// A null source compiles to an empty populator. Scalar and array
    /// sources cannot be merged onto an instance and are rejected.
    pub fn compile(
        ctx: &MetaContext,
        target_type: &ValueType,
        source: &PopulateSource,
    ) -> MetaResult<Self> {
        match source {
            PopulateSource::Null => return Ok(Self::empty(target_type.clone())),
            PopulateSource::Scalar(_) | PopulateSource::Array(_) => {
                return Err(MetaError::InvalidOperation(format!(
                    "cannot populate {target_type} from a non-object source"
                )));
            }
            PopulateSource::Object(_) => {}
        }

        let declared = ctx.types().declared_properties(target_type)?;
        let mut actions = Vec::new();
        let mut unmatched = Vec::new();
        for (name, child) in source.entries() {
            match find(&declared, name) {
                Some(property) => {
                    if let Some(action) = compile_action(ctx, property, child)? {
                        actions.push(action);
                    }
                }
                None => unmatched.push((name.to_string(), child.clone())),
            }
        }

        for owner in declared.iter().filter(|p| p.merge_onto_owner()) {
            if actions.iter().any(|action| action.property() == owner) {
                continue;
            }
            let members = ctx.types().declared_properties(owner.value_type())?;
            let (merged, rest): (Vec<_>, Vec<_>) = unmatched
                .into_iter()
                .partition(|(name, _)| find(&members, name).is_some());
            unmatched = rest;
            if merged.is_empty() {
                continue;
            }
            let source = PopulateSource::object(merged);
            let nested = Arc::new(Self::compile(ctx, owner.value_type(), &source)?);
            actions.push(PopulatorAction::Merge {
                property: Arc::clone(owner),
                source,
                nested,
            });
        }

        if !unmatched.is_empty() {
            trace!(
                target_type = %target_type,
                names = ?unmatched.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
                "source entries without a declared member"
            );
        }
        Ok(Self {
            target_type: target_type.clone(),
            actions,
            tail: unmatched,
            tail_populators: DashMap::new(),
        })
    }

    #[must_use]
    pub fn target_type(&self) -> &ValueType {
        &self.target_type
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Names of source entries that matched no declared member. They are
    /// applied to the target's open tail, if it has one, and dropped otherwise.
    pub fn unmatched(&self) -> impl Iterator<Item = &str> {
        self.tail.iter().map(|(name, _)| name.as_str())
    }

    /// Applies this populator to `target`. Declared members are assigned
    /// first, then the open tail. A null target is left alone.
    pub fn populate<'a>(
        &'a self,
        ctx: &'a MetaContext,
        target: &'a Value,
    ) -> BoxFuture<'a, MetaResult<()>> {
        async move {
            if target.is_null() {
                return Ok(());
            }
            for action in &self.actions {
                action.apply(ctx, target).await?;
            }
            self.apply_tail(ctx, target).await
        }
        .boxed()
    }

    async fn apply_tail(&self, ctx: &MetaContext, target: &Value) -> MetaResult<()> {
        if self.tail.is_empty() {
            return Ok(());
        }
        if !has_open_tail(ctx, target) {
            trace!(
                target_type = %target.runtime_type(),
                count = self.tail.len(),
                "target has no open tail, dropping unmatched entries"
            );
            return Ok(());
        }

        let types = ctx.types();
        for (name, source) in &self.tail {
            let member = DynamicProperty::new(name.as_str(), false);
            let existing = member.resolve(types, target).await;
            match (existing, source) {
                (Some((key, existing)), PopulateSource::Object(_)) if is_mergeable(&existing) => {
                    let nested = self.tail_populator(ctx, &key, &existing, source)?;
                    nested.populate(ctx, &existing).await?;
                }
                _ => {
                    let value = build_value(ctx, &ValueType::Any, source).await?;
                    member.set_value(types, target, value)?;
                }
            }
        }
        Ok(())
    }

    fn tail_populator(
        &self,
        ctx: &MetaContext,
        name: &str,
        existing: &Value,
        source: &PopulateSource,
    ) -> MetaResult<Arc<Populator>> {
        let key = (name.to_lowercase(), existing.runtime_type());
        let cached = self
            .tail_populators
            .get(&key)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(nested) = cached {
            return Ok(nested);
        }
        let fresh = Arc::new(Self::compile(ctx, &key.1, source)?);
        Ok(Arc::clone(
            self.tail_populators.entry(key).or_insert(fresh).value(),
        ))
    }
}

impl fmt::Debug for Populator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Populator")
            .field("target_type", &self.target_type)
            .field("actions", &self.actions.len())
            .field("unmatched", &self.unmatched().collect::<Vec<_>>())
            .finish()
    }
}

fn find<'a>(
    properties: &'a [Arc<DeclaredProperty>],
    name: &str,
) -> Option<&'a Arc<DeclaredProperty>> {
    properties
        .iter()
        .find(|p| p.name() == name)
        .or_else(|| properties.iter().find(|p| p.name().eq_ignore_ascii_case(name)))
}

fn compile_action(
    ctx: &MetaContext,
    property: &Arc<DeclaredProperty>,
    source: &PopulateSource,
) -> MetaResult<Option<PopulatorAction>> {
    let direct = |value: Prepared| {
        Some(PopulatorAction::DirectSet {
            property: Arc::clone(property),
            value,
        })
    };
    let value_type = property.value_type();
    let action = match source {
        PopulateSource::Null if value_type.is_value_type() => {
            match ctx.config().value_type_nulls {
                NullPolicy::Skip => None,
                NullPolicy::ResetToDefault => {
                    zero_value(value_type).and_then(|zero| direct(Prepared::Constant(zero)))
                }
            }
        }
        PopulateSource::Null => direct(Prepared::Constant(Value::Null)),
        PopulateSource::Scalar(value) => {
            direct(Prepared::Constant(value.clone().coerce(value_type)?))
        }
        PopulateSource::Array(_) => direct(Prepared::Build(source.clone())),
        PopulateSource::Object(_) => {
            if !accepts_object_source(value_type) {
                return Err(MetaError::InvalidOperation(format!(
                    "cannot populate {} ({value_type}) from an object source",
                    property.name()
                )));
            }
            if !property.is_readable() || property.replace_on_update() {
                direct(Prepared::Build(source.clone()))
            } else if value_type.is_any() {
                Some(PopulatorAction::DynamicMerge {
                    property: Arc::clone(property),
                    source: source.clone(),
                    compiled: DashMap::new(),
                })
            } else {
                Some(PopulatorAction::Merge {
                    property: Arc::clone(property),
                    source: source.clone(),
                    nested: Arc::new(Populator::compile(ctx, value_type, source)?),
                })
            }
        }
    };
    Ok(action)
}

fn zero_value(value_type: &ValueType) -> Option<Value> {
    match value_type {
        ValueType::Bool => Some(Value::Bool(false)),
        ValueType::Int => Some(Value::Int(0)),
        ValueType::Float => Some(Value::Float(0.0)),
        _ => None,
    }
}

/// Types an object source can be merged onto or built as.
fn accepts_object_source(value_type: &ValueType) -> bool {
    matches!(
        value_type.underlying(),
        ValueType::Object(_) | ValueType::Any | ValueType::Map(_)
    )
}

fn is_mergeable(value: &Value) -> bool {
    matches!(value, Value::Map(_) | Value::Object(_))
}

fn has_open_tail(ctx: &MetaContext, target: &Value) -> bool {
    match target {
        Value::Map(_) => true,
        Value::Object(object) => ctx
            .registry()
            .get(object.type_name().as_str())
            .is_some_and(|def| def.has_map_tail() || def.has_dynamic_members()),
        _ => false,
    }
}

/// Builds a fresh value of `value_type` from `source`.
///
/// Object sources construct a new instance of a model type (through its
/// serialization metadata) or a map for `Any` and map types.
pub(crate) fn build_value<'a>(
    ctx: &'a MetaContext,
    value_type: &'a ValueType,
    source: &'a PopulateSource,
) -> BoxFuture<'a, MetaResult<Value>> {
    async move {
        match source {
            PopulateSource::Null => Ok(Value::Null),
            PopulateSource::Scalar(value) => Ok(value.clone().coerce(value_type)?),
            PopulateSource::Array(items) => {
                let element = value_type
                    .element_type()
                    .cloned()
                    .unwrap_or(ValueType::Any);
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(build_value(ctx, &element, item).await?);
                }
                Ok(Value::List(SharedList::from_vec(values)).coerce(value_type)?)
            }
            PopulateSource::Object(_) => match value_type.underlying() {
                ValueType::Object(_) => {
                    ctx.serialization_metadata(value_type)?
                        .create_instance(ctx, source)
                        .await
                }
                ValueType::Any | ValueType::Map(_) => {
                    let element = value_type
                        .element_type()
                        .cloned()
                        .unwrap_or(ValueType::Any);
                    let map = SharedMap::new();
                    for (name, child) in source.entries() {
                        map.insert(name, build_value(ctx, &element, child).await?);
                    }
                    Ok(Value::Map(map))
                }
                other => Err(MetaError::InvalidOperation(format!(
                    "cannot build {other} from an object source"
                ))),
            },
        }
    }
    .boxed()
}
