//! Attribute definitions, values and their combination rules.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use super::fqn::{AttributeDefinitionFqn, AttributeValueFqn};

/// How the values of one attribute definition combine.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ToSchema,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AttributeRule {
    #[default]
    #[serde(
        rename = "ATTRIBUTE_RULE_TYPE_ENUM_UNSPECIFIED",
        alias = "UNSPECIFIED"
    )]
    Unspecified,
    /// Every required value must be entitled.
    #[serde(rename = "ATTRIBUTE_RULE_TYPE_ENUM_ALL_OF", alias = "ALL_OF")]
    AllOf,
    /// At least one required value must be entitled.
    #[serde(rename = "ATTRIBUTE_RULE_TYPE_ENUM_ANY_OF", alias = "ANY_OF")]
    AnyOf,
    /// Values are ordered, highest first. An entitlement to a value covers
    /// every value that ranks below it.
    #[serde(rename = "ATTRIBUTE_RULE_TYPE_ENUM_HIERARCHY", alias = "HIERARCHY")]
    Hierarchy,
}

/// A value of an attribute definition, with the obligations a PERMIT on it carries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    #[serde(deserialize_with = "lowercase")]
    pub value: String,
    #[serde(default)]
    pub obligations: Vec<String>,
}

impl AttributeValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into().to_lowercase(),
            obligations: Vec::new(),
        }
    }

    pub fn with_obligation(mut self, obligation: impl Into<String>) -> Self {
        self.obligations.push(obligation.into());
        self
    }
}

fn lowercase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.to_lowercase())
}

/// An attribute definition under a namespace.
///
/// `values` is ordered; for `HIERARCHY` definitions index 0 is the highest rank.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub fqn: AttributeDefinitionFqn,
    pub rule: AttributeRule,
    #[serde(default)]
    pub values: Vec<AttributeValue>,
}

impl AttributeDefinition {
    pub fn new(fqn: AttributeDefinitionFqn, rule: AttributeRule, values: &[&str]) -> Self {
        Self {
            fqn,
            rule,
            values: values.iter().map(|v| AttributeValue::new(*v)).collect(),
        }
    }

    /// FQNs of every value, in definition order.
    pub fn value_fqns(&self) -> Vec<AttributeValueFqn> {
        self.values.iter().map(|v| self.fqn.value(&v.value)).collect()
    }

    /// Position of a value in the definition, if it belongs to it.
    pub fn rank_of(&self, fqn: &AttributeValueFqn) -> Option<usize> {
        if fqn.definition() != &self.fqn {
            return None;
        }
        self.values
            .iter()
            .position(|v| v.value == fqn.value())
    }

    pub fn find_value(&self, fqn: &AttributeValueFqn) -> Option<&AttributeValue> {
        self.rank_of(fqn).map(|idx| &self.values[idx])
    }
}
