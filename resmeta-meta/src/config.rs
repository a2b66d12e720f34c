//! Engine configuration.

use crate::error::MetaResult;
use crate::term_factory::BindingRule;
use serde::{Deserialize, Serialize};

/// What the populator does with `null` aimed at a non-nullable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Leave the member untouched.
    #[default]
    Skip,
    /// Assign the type's zero value.
    ResetToDefault,
}

/// Configuration for a [`MetaContext`](crate::MetaContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Separator between term components.
    pub separator: String,
    /// Binding rule for terms requested by the condition layer.
    pub condition_binding: BindingRule,
    /// Binding rule for terms requested by output shaping.
    pub output_binding: BindingRule,
    pub value_type_nulls: NullPolicy,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            condition_binding: BindingRule::DeclaredWithDynamicFallback,
            output_binding: BindingRule::DynamicWithDeclaredFallback,
            value_type_nulls: NullPolicy::Skip,
        }
    }
}

impl MetaConfig {
    /// Loads a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> MetaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
