//! Model layer for resmeta.
//!
//! Rust has no runtime reflection, so every model type is described once,
//! at registration time, by an explicit accessor table:
//! - [`TypeDef`]: a class or interface with its members, base type,
//!   implemented interfaces, constructors and optional capabilities
//! - [`MemberDef`]: one member with its [`Getter`]/[`Setter`] pair and
//!   [`PropertyAttributes`]
//! - [`DynamicMembers`]: the "try get / try set named member" protocol
//! - [`TypeRegistry`]: the immutable set of registered types
//!
//! The engine in `resmeta-meta` reads this configuration once per type.

mod attributes;
mod member;
mod projection;
mod registry;
mod type_def;

pub use attributes::{Operators, PropertyAttributes, TypeAttributes};
pub use member::{AsyncGetter, Getter, MemberDef, Setter, SyncGetter};
pub use projection::StateProjection;
pub use registry::TypeRegistry;
pub use type_def::{
    Constructor, ConstructorParameter, Creator, DynamicMembers, ParameterizedCreator, TypeDef,
    TypeKind,
};
