//! Subject mappings: rules that entitle entities to attribute values.
//!
//! A mapping matches when every subject set matches. A subject set matches
//! when every condition group matches, and a condition group combines its
//! conditions with its boolean operator.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use super::action::Action;
use super::fqn::AttributeValueFqn;

/// How a condition compares selected entity values with the listed values.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Operator {
    /// Any selected value equals any listed value.
    #[serde(rename = "SUBJECT_MAPPING_OPERATOR_ENUM_IN", alias = "IN")]
    In,
    /// No selected value equals any listed value.
    #[serde(rename = "SUBJECT_MAPPING_OPERATOR_ENUM_NOT_IN", alias = "NOT_IN")]
    NotIn,
    /// Any selected value contains any listed value as a substring.
    #[serde(
        rename = "SUBJECT_MAPPING_OPERATOR_ENUM_IN_CONTAINS",
        alias = "IN_CONTAINS"
    )]
    InContains,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BooleanOperator {
    #[serde(rename = "CONDITION_BOOLEAN_TYPE_ENUM_AND", alias = "AND")]
    And,
    #[serde(rename = "CONDITION_BOOLEAN_TYPE_ENUM_OR", alias = "OR")]
    Or,
}

/// A single selector comparison, e.g. `.groups[] IN ["eng", "ops"]`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub subject_external_selector_value: String,
    pub operator: Operator,
    #[serde(default)]
    pub subject_external_values: Vec<String>,
}

impl Condition {
    pub fn new(selector: impl Into<String>, operator: Operator, values: &[&str]) -> Self {
        Self {
            subject_external_selector_value: selector.into(),
            operator,
            subject_external_values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub boolean_operator: BooleanOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSet {
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConditionSet {
    #[serde(default)]
    pub subject_sets: Vec<SubjectSet>,
}

impl SubjectConditionSet {
    /// A condition set made of one subject set holding one group.
    pub fn single(boolean_operator: BooleanOperator, conditions: Vec<Condition>) -> Self {
        Self {
            subject_sets: vec![SubjectSet {
                condition_groups: vec![ConditionGroup {
                    boolean_operator,
                    conditions,
                }],
            }],
        }
    }
}

/// Entitles entities matching `subject_condition_set` to `attribute_value_fqn`
/// for `actions`. An empty action list entitles every action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMapping {
    #[serde(default)]
    pub id: String,
    pub attribute_value_fqn: AttributeValueFqn,
    pub subject_condition_set: SubjectConditionSet,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl SubjectMapping {
    pub fn permits_action(&self, action: &Action) -> bool {
        self.actions.is_empty() || self.actions.iter().any(|a| a.matches(action))
    }
}
