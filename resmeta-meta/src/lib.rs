//! Member-path resolution and population engine.
//!
//! Given model types described in a [`TypeRegistry`](resmeta_model::TypeRegistry),
//! this crate lets callers refer to "a property of a property" on any
//! value through one path abstraction:
//!
//! - [`Term`]: an immutable chain of [`Property`] links, parsed and
//!   cached by the [`TermFactory`] under a [`BindingRule`]
//! - [`TypeCache`]: the declared members of each type as an
//!   [`EntityTypeContract`]
//! - [`PropertyMonitoringTree`]: change notification over every declared
//!   property reachable from a root type, including dependent terms
//! - [`Populator`]: compiled, merging population of object graphs from a
//!   [`PopulateSource`](resmeta_types::PopulateSource)
//! - [`SerializationMetadata`]: output order and construction of instances
//!
//! All caches live in a [`MetaContext`], created once and shared.

mod config;
mod context;
mod error;
mod monitoring;
mod populator;
mod property;
mod serialization;
mod term;
mod term_factory;
mod type_cache;

pub use config::{MetaConfig, NullPolicy};
pub use context::MetaContext;
pub use error::{MetaError, MetaResult};
pub use monitoring::{ChangeHandler, LinkKind, PropertyLink, PropertyMonitoringTree, TermChange};
pub use populator::Populator;
pub use property::{
    ChangeListener, DeclaredProperty, DynamicProperty, IndexPosition, IndexProperty, ListenerId,
    Observed, Property, PropertyChanged,
};
pub use serialization::SerializationMetadata;
pub use term::Term;
pub use term_factory::{BindingRule, DynamicDomain, TermFactory};
pub use type_cache::{EntityTypeContract, TypeCache};
