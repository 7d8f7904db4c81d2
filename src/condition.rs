//! Evaluation of subject condition sets against a flattened entity.

use serde_json::Value;

use crate::flatten::Flattened;
use crate::types::{
    BooleanOperator, Condition, ConditionGroup, Operator, SubjectConditionSet, SubjectSet,
};

/// Subject sets are AND-ed. An empty condition set matches nothing.
pub fn evaluate_condition_set(set: &SubjectConditionSet, entity: &Flattened) -> bool {
    !set.subject_sets.is_empty()
        && set
            .subject_sets
            .iter()
            .all(|subject_set| evaluate_subject_set(subject_set, entity))
}

/// Condition groups are AND-ed.
pub fn evaluate_subject_set(set: &SubjectSet, entity: &Flattened) -> bool {
    set.condition_groups
        .iter()
        .all(|group| evaluate_condition_group(group, entity))
}

pub fn evaluate_condition_group(group: &ConditionGroup, entity: &Flattened) -> bool {
    match group.boolean_operator {
        BooleanOperator::And => group.conditions.iter().all(|c| evaluate_condition(c, entity)),
        BooleanOperator::Or => group.conditions.iter().any(|c| evaluate_condition(c, entity)),
    }
}

pub fn evaluate_condition(condition: &Condition, entity: &Flattened) -> bool {
    let selected = entity.get(&condition.subject_external_selector_value);
    let listed = &condition.subject_external_values;

    match condition.operator {
        Operator::In => selected
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| listed.iter().any(|l| l == s)),
        Operator::NotIn => !selected
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| listed.iter().any(|l| l == s)),
        Operator::InContains => selected.iter().map(|v| scalar_text(v)).any(|s| {
            listed
                .iter()
                .any(|l| s.contains(l.as_str()))
        }),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
