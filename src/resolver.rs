//! Entity representation and entitlement resolution.
//!
//! An [`EntityResolver`] turns an entity into the JSON document subject
//! mapping selectors run against. [`EntitlementResolver`] flattens that
//! document and evaluates every relevant subject mapping in a snapshot.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::condition::evaluate_condition_set;
use crate::error::AuthzError;
use crate::flatten::flatten;
use crate::store::PolicySnapshot;
use crate::token::decode_unverified_claims;
use crate::types::{
    Action, AttributeRule, AttributeValueFqn, Entity, EntityEntitlements, EntityType,
    ResourceAttribute,
};

/// Produces the JSON representation of an entity.
pub trait EntityResolver: Send + Sync {
    /// `Ok(None)` when the entity is well formed but cannot be resolved;
    /// such an entity ends up with no entitlements.
    fn resolve(&self, entity: &Entity) -> Result<Option<Value>, AuthzError>;
}

/// Resolves entities from what they carry: claims and custom blobs as is,
/// JWT payloads decoded, and plain identifiers as their protojson form
/// (e.g. `{"id": "e1", "emailAddress": "alice@example.com"}`).
/// Remote claims URLs are not fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsEntityResolver;

impl EntityResolver for ClaimsEntityResolver {
    fn resolve(&self, entity: &Entity) -> Result<Option<Value>, AuthzError> {
        let entity_type = entity.validate()?;
        let representation = match entity_type {
            EntityType::Claims(value) | EntityType::Custom(value) => Some(value.clone()),
            EntityType::Jwt(jwt) => match decode_unverified_claims(jwt) {
                Ok(claims) => Some(Value::Object(claims)),
                Err(e) => {
                    warn!(
                        event = "Resolve",
                        entity = %entity,
                        error = %e,
                        "undecodable token, no entitlements"
                    );
                    None
                }
            },
            EntityType::RemoteClaimsUrl(url) => {
                debug!(event = "Resolve", entity = %entity, url = %url, "remote claims not supported");
                None
            }
            EntityType::EmailAddress(_)
            | EntityType::UserName(_)
            | EntityType::ClientId(_)
            | EntityType::Uuid(_) => Some(serde_json::to_value(entity)?),
        };
        Ok(representation)
    }
}

/// Which actions an entitlement covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AllActions,
    Actions(BTreeSet<Action>),
}

impl Grant {
    fn from_actions(actions: &[Action]) -> Self {
        if actions.is_empty() {
            Grant::AllActions
        } else {
            Grant::Actions(actions.iter().cloned().collect())
        }
    }

    fn merge(&mut self, other: &Grant) {
        match other {
            Grant::AllActions => *self = Grant::AllActions,
            Grant::Actions(theirs) => {
                if let Grant::Actions(mine) = self {
                    mine.extend(theirs.iter().cloned());
                }
            }
        }
    }

    pub fn covers(&self, action: &Action) -> bool {
        match self {
            Grant::AllActions => true,
            Grant::Actions(actions) => actions.iter().any(|a| a.matches(action)),
        }
    }
}

/// The attribute values one entity is entitled to, with their grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entitlements {
    grants: BTreeMap<AttributeValueFqn, Grant>,
}

impl Entitlements {
    pub fn insert(&mut self, value: AttributeValueFqn, grant: Grant) {
        self.grants
            .entry(value)
            .and_modify(|existing| existing.merge(&grant))
            .or_insert(grant);
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn contains(&self, value: &AttributeValueFqn) -> bool {
        self.grants.contains_key(value)
    }

    /// Whether the entitlement to `value` covers `action`.
    pub fn permits(&self, value: &AttributeValueFqn, action: &Action) -> bool {
        self.grants.get(value).is_some_and(|g| g.covers(action))
    }

    pub fn values(&self) -> impl Iterator<Item = &AttributeValueFqn> {
        self.grants.keys()
    }

    /// Canonical FQN strings, sorted.
    pub fn fqns(&self) -> Vec<String> {
        self.grants.keys().map(ToString::to_string).collect()
    }

    /// Add every value ranked below an entitled HIERARCHY value.
    pub fn expand_hierarchies(&mut self, snapshot: &PolicySnapshot) {
        let mut implied = Vec::new();
        for (value, grant) in &self.grants {
            let Some(definition) = snapshot.definition(value.definition()) else {
                continue;
            };
            if definition.rule != AttributeRule::Hierarchy {
                continue;
            }
            if let Some(rank) = definition.rank_of(value) {
                for lower in definition.value_fqns().into_iter().skip(rank + 1) {
                    implied.push((lower, grant.clone()));
                }
            }
        }
        for (value, grant) in implied {
            self.insert(value, grant);
        }
    }
}

/// Parse scope FQNs, dropping (and logging) malformed ones.
pub fn scope_set(scope: &ResourceAttribute) -> HashSet<AttributeValueFqn> {
    scope
        .attribute_value_fqns
        .iter()
        .filter_map(|raw| match raw.parse::<AttributeValueFqn>() {
            Ok(fqn) => Some(fqn),
            Err(e) => {
                warn!(event = "Entitlements", phase = "Scope", error = %e);
                None
            }
        })
        .collect()
}

/// Evaluates subject mappings from one snapshot.
pub struct EntitlementResolver<'a> {
    snapshot: &'a PolicySnapshot,
    entity_resolver: &'a dyn EntityResolver,
}

impl<'a> EntitlementResolver<'a> {
    pub fn new(snapshot: &'a PolicySnapshot, entity_resolver: &'a dyn EntityResolver) -> Self {
        Self {
            snapshot,
            entity_resolver,
        }
    }

    /// Entitlements of one entity. With `scope`, only mappings for values in
    /// the scope are evaluated.
    pub fn resolve_entity(
        &self,
        entity: &Entity,
        scope: Option<&HashSet<AttributeValueFqn>>,
    ) -> Result<Entitlements, AuthzError> {
        let mut entitlements = Entitlements::default();
        let Some(representation) = self.entity_resolver.resolve(entity)? else {
            return Ok(entitlements);
        };
        let flattened = flatten(&representation);

        for mapping in self.snapshot.subject_mappings() {
            if scope.is_some_and(|s| !s.contains(&mapping.attribute_value_fqn)) {
                continue;
            }
            if evaluate_condition_set(&mapping.subject_condition_set, &flattened) {
                entitlements.insert(
                    mapping.attribute_value_fqn.clone(),
                    Grant::from_actions(&mapping.actions),
                );
            }
        }

        debug!(
            event = "Entitlements",
            phase = "Resolved",
            entity = %entity,
            count = entitlements.len()
        );
        Ok(entitlements)
    }

    /// Entitlements for each entity, in input order.
    pub fn resolve_entitlements(
        &self,
        entities: &[Entity],
        scope: Option<&ResourceAttribute>,
        with_comprehensive_hierarchy: bool,
    ) -> Result<Vec<EntityEntitlements>, AuthzError> {
        let scope = scope.map(scope_set);
        entities
            .iter()
            .map(|entity| {
                let mut entitlements = self.resolve_entity(entity, scope.as_ref())?;
                if with_comprehensive_hierarchy {
                    entitlements.expand_hierarchies(self.snapshot);
                }
                Ok(EntityEntitlements {
                    entity_id: entity.id.clone(),
                    attribute_value_fqns: entitlements.fqns(),
                })
            })
            .collect()
    }
}
