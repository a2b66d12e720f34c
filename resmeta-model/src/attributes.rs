//! Declarative member and type decorations.
//!
//! These are plain configuration structs standing in for attribute
//! reflection. They deserialize from JSON so a model can be decorated
//! from a config file as well as from code.

use bitflags::bitflags;
use resmeta_types::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

bitflags! {
    /// Condition operators a property may be filtered with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Operators: u8 {
        const EQUALS = 1;
        const NOT_EQUALS = 1 << 1;
        const LESS_THAN = 1 << 2;
        const GREATER_THAN = 1 << 3;
        const LESS_THAN_OR_EQUALS = 1 << 4;
        const GREATER_THAN_OR_EQUALS = 1 << 5;
        const EQUALITY = Self::EQUALS.bits() | Self::NOT_EQUALS.bits();
        const COMPARE = Self::LESS_THAN.bits()
            | Self::GREATER_THAN.bits()
            | Self::LESS_THAN_OR_EQUALS.bits()
            | Self::GREATER_THAN_OR_EQUALS.bits();
    }
}

impl Default for Operators {
    fn default() -> Self {
        Self::all()
    }
}

/// Per-member decorations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyAttributes {
    /// Excluded from the declared member set.
    pub ignore: bool,
    /// Exposed name; the member keeps its actual name for reverse lookups.
    pub rename: Option<String>,
    /// Explicit ordering hint. Members without one follow in declaration order.
    pub order: Option<i32>,
    pub hidden: bool,
    pub hidden_if_null: bool,
    /// Terms through this member are skipped by condition evaluation.
    pub skip_conditions: bool,
    /// Population assigns a fresh value instead of merging onto the existing one.
    pub replace_on_update: bool,
    /// The member's own members are exposed as if declared on the owner.
    pub merge_onto_owner: bool,
    pub allowed_operators: Operators,
    /// Terms, relative to the owner type, whose value depends on this member.
    pub defines: Vec<String>,
    pub flags: BTreeSet<String>,
}

/// Per-type decorations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeAttributes {
    /// The type exposes no declared members at all.
    pub ignore_members: bool,
    /// Members are taken from this interface instead of the type itself.
    pub interface_surface: Option<TypeName>,
    /// The type is a view of another type and also exposes its members.
    pub view_of: Option<TypeName>,
}
