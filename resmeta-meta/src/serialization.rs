//! Per-type metadata used to read and construct instances.

use crate::context::MetaContext;
use crate::error::{MetaError, MetaResult};
use crate::populator::{Populator, build_value};
use crate::property::DeclaredProperty;
use crate::type_cache::{EntityTypeContract, TypeCache};
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use resmeta_model::Constructor;
use resmeta_types::{Object, PopulateSource, Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// What output shaping and deserialization need to know about a type.
pub struct SerializationMetadata {
    value_type: ValueType,
    contract: Option<Arc<EntityTypeContract>>,
    properties: Vec<Arc<DeclaredProperty>>,
    is_dictionary: bool,
    is_enumerable: bool,
    constructor: Option<Constructor>,
    /// For each constructor parameter, the declared property it initializes.
    parameter_properties: Vec<Option<Arc<DeclaredProperty>>>,
}

impl SerializationMetadata {
    pub fn new(types: &TypeCache, value_type: &ValueType) -> MetaResult<Self> {
        let contract = value_type
            .object_name()
            .map(|name| types.contract(name))
            .transpose()?;
        let def = value_type
            .object_name()
            .and_then(|name| types.registry().get(name.as_str()));

        let properties = contract
            .as_ref()
            .map(|contract| {
                contract
                    .properties()
                    .iter()
                    .filter(|p| p.is_readable() && !p.hidden())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let is_dictionary = matches!(value_type.underlying(), ValueType::Map(_))
            || def.is_some_and(|def| def.has_map_tail() || def.has_dynamic_members());
        let constructor = def.and_then(|def| def.constructor_def().cloned());
        let parameter_properties = match (&constructor, &contract) {
            (Some(Constructor::Parameterized { parameters, .. }), Some(contract)) => parameters
                .iter()
                .map(|parameter| {
                    contract
                        .properties()
                        .iter()
                        .find(|p| p.actual_name().eq_ignore_ascii_case(&parameter.name))
                        .or_else(|| contract.property(&parameter.name))
                        .cloned()
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            value_type: value_type.clone(),
            contract,
            properties,
            is_dictionary,
            is_enumerable: value_type.is_sequence(),
            constructor,
            parameter_properties,
        })
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    #[must_use]
    pub fn contract(&self) -> Option<&Arc<EntityTypeContract>> {
        self.contract.as_ref()
    }

    /// Readable, visible properties in output order.
    #[must_use]
    pub fn properties(&self) -> &[Arc<DeclaredProperty>] {
        &self.properties
    }

    /// The type is, or carries, a string-keyed mapping.
    #[must_use]
    pub fn is_dictionary(&self) -> bool {
        self.is_dictionary
    }

    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        self.is_enumerable
    }

    #[must_use]
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    #[must_use]
    pub fn parameter_properties(&self) -> &[Option<Arc<DeclaredProperty>>] {
        &self.parameter_properties
    }

    /// Constructs an instance from `source`.
    ///
    /// A custom creator set on the contract wins over the registered
    /// constructor. Parameterized constructors take their arguments from
    /// the source entries named like the parameters (or like the declared
    /// properties they initialize); every missing required parameter is
    /// reported at once. Remaining entries are then populated onto the
    /// new instance.
    pub fn create_instance<'a>(
        &'a self,
        ctx: &'a MetaContext,
        source: &'a PopulateSource,
    ) -> BoxFuture<'a, MetaResult<Value>> {
        async move {
            let type_name = self.value_type.object_name().ok_or_else(|| {
                MetaError::InvalidOperation(format!(
                    "cannot construct an instance of {}",
                    self.value_type
                ))
            })?;

            let creator = self.contract.as_ref().and_then(|c| c.creator());
            let (object, consumed): (Object, Vec<String>) = match (creator, &self.constructor) {
                (Some(create), _) => (create(), Vec::new()),
                (None, Some(Constructor::Parameterless(create))) => (create(), Vec::new()),
                (None, Some(Constructor::Parameterized { parameters, create })) => {
                    let mut arguments = Vec::with_capacity(parameters.len());
                    let mut consumed = Vec::new();
                    let mut missing = Vec::new();
                    for (index, parameter) in parameters.iter().enumerate() {
                        let property = self.parameter_properties.get(index).and_then(Option::as_ref);
                        let entry = property
                            .and_then(|p| lookup(source, p.name()))
                            .or_else(|| lookup(source, &parameter.name));
                        match entry {
                            Some((name, child)) if !child.is_null() => {
                                arguments.push(build_value(ctx, &parameter.value_type, child).await?);
                                consumed.push(name.to_string());
                            }
                            Some((name, _)) if !parameter.required => {
                                arguments.push(Value::Null);
                                consumed.push(name.to_string());
                            }
                            None if !parameter.required => arguments.push(Value::Null),
                            _ => missing.push(parameter.name.clone()),
                        }
                    }
                    if !missing.is_empty() {
                        return Err(MetaError::MissingConstructorParameters {
                            type_name: type_name.to_string(),
                            parameters: missing,
                        });
                    }
                    (create(arguments)?, consumed)
                }
                (None, None) => {
                    return Err(MetaError::InvalidOperation(format!(
                        "type {type_name} has no constructor"
                    )));
                }
            };

            let instance = Value::Object(object);
            let remaining = PopulateSource::object(
                source
                    .entries()
                    .filter(|(name, _)| !consumed.iter().any(|c| c == name))
                    .map(|(name, child)| (name.to_string(), child.clone())),
            );
            Populator::compile(ctx, &self.value_type, &remaining)?
                .populate(ctx, &instance)
                .await?;
            Ok(instance)
        }
        .boxed()
    }

    /// Visible values of `target` in output order.
    ///
    /// Null values of `hidden_if_null` properties are left out. Entries of
    /// an open tail follow the declared properties.
    pub async fn visible_values(&self, types: &TypeCache, target: &Value) -> IndexMap<String, Value> {
        let mut values = IndexMap::new();
        for property in &self.properties {
            let value = property.get_value(target).await;
            if value.is_null() && property.hidden_if_null() {
                continue;
            }
            values.insert(property.name().to_string(), value);
        }
        let tail: Vec<(String, Value)> = match target {
            Value::Map(map) => map.snapshot().into_iter().collect(),
            Value::Object(object) => types
                .registry()
                .get(object.type_name().as_str())
                .map(|def| def.tail_entries(object))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        for (name, value) in tail {
            values.entry(name).or_insert(value);
        }
        values
    }
}

fn lookup<'a>(source: &'a PopulateSource, name: &str) -> Option<(&'a str, &'a PopulateSource)> {
    source
        .entries()
        .find(|(key, _)| *key == name)
        .or_else(|| source.entries().find(|(key, _)| key.eq_ignore_ascii_case(name)))
}

impl fmt::Debug for SerializationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationMetadata")
            .field("value_type", &self.value_type)
            .field("properties", &self.properties.len())
            .field("is_dictionary", &self.is_dictionary)
            .field("is_enumerable", &self.is_enumerable)
            .field("constructor", &self.constructor)
            .finish()
    }
}
