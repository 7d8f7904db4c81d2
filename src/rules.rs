//! Attribute rule evaluation for one entity against one attribute group.

use tracing::debug;

use crate::error::AuthzError;
use crate::resolver::Entitlements;
use crate::types::{Action, AttributeDefinition, AttributeRule, AttributeValueFqn};

/// Whether `entitlements` satisfy `definition`'s rule for the `required`
/// values (all of which belong to `definition`) and `action`.
pub fn evaluate_rule(
    definition: &AttributeDefinition,
    required: &[AttributeValueFqn],
    entitlements: &Entitlements,
    action: &Action,
) -> Result<bool, AuthzError> {
    let passed = match definition.rule {
        AttributeRule::AllOf => all_of(required, entitlements, action),
        AttributeRule::AnyOf => any_of(required, entitlements, action),
        AttributeRule::Hierarchy => hierarchy(definition, required, entitlements, action),
        AttributeRule::Unspecified => {
            return Err(AuthzError::InvalidRequest(format!(
                "attribute definition '{}' has an unspecified rule",
                definition.fqn
            )));
        }
    };

    debug!(
        event = "Rule",
        definition = %definition.fqn,
        rule = %definition.rule,
        action = %action,
        passed = passed
    );
    Ok(passed)
}

fn all_of(required: &[AttributeValueFqn], entitlements: &Entitlements, action: &Action) -> bool {
    required.iter().all(|v| entitlements.permits(v, action))
}

fn any_of(required: &[AttributeValueFqn], entitlements: &Entitlements, action: &Action) -> bool {
    required.iter().any(|v| entitlements.permits(v, action))
}

/// The highest ranked required value decides. Any entitled value at or
/// above that rank satisfies it.
fn hierarchy(
    definition: &AttributeDefinition,
    required: &[AttributeValueFqn],
    entitlements: &Entitlements,
    action: &Action,
) -> bool {
    let Some(required_rank) = required.iter().filter_map(|v| definition.rank_of(v)).min() else {
        return false;
    };

    entitlements
        .values()
        .filter(|v| entitlements.permits(v, action))
        .filter_map(|v| definition.rank_of(v))
        .any(|rank| rank <= required_rank)
}
