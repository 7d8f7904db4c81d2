//! Decision and entitlement request/response types.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::action::Action;
use super::entity::{Entity, EntityChain};

/// Version metadata for the policy snapshot used during an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVersion {
    /// SHA-256 of the loaded policy document.
    pub hash: String,
    /// RFC 3339 timestamp of when the snapshot was loaded.
    pub loaded_at: String,
}

impl Display for PolicyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} @ {}", self.hash, self.loaded_at)
    }
}

/// Outcome of a decision. Responses never carry `Unspecified`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
pub enum Decision {
    #[default]
    #[serde(rename = "DECISION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "DECISION_DENY")]
    Deny,
    #[serde(rename = "DECISION_PERMIT")]
    Permit,
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }

    pub fn from_bool(permitted: bool) -> Self {
        if permitted {
            Decision::Permit
        } else {
            Decision::Deny
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Decision::Unspecified => "UNSPECIFIED",
            Decision::Deny => "DENY",
            Decision::Permit => "PERMIT",
        };
        write!(f, "{s}")
    }
}

/// A set of attribute value FQNs describing one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttribute {
    #[serde(default)]
    pub resource_attributes_id: String,
    #[serde(default)]
    pub attribute_value_fqns: Vec<String>,
}

impl ResourceAttribute {
    pub fn new<I, S>(id: impl Into<String>, fqns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_attributes_id: id.into(),
            attribute_value_fqns: fqns.into_iter().map(Into::into).collect(),
        }
    }

    /// The id echoed in responses: the request's id, or the first FQN when empty.
    pub fn response_id(&self) -> String {
        if self.resource_attributes_id.is_empty() {
            self.attribute_value_fqns.first().cloned().unwrap_or_default()
        } else {
            self.resource_attributes_id.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub entity_chains: Vec<EntityChain>,
    #[serde(default)]
    pub resource_attributes: Vec<ResourceAttribute>,
}

impl DecisionRequest {
    /// Number of responses this request produces.
    pub fn pair_count(&self) -> usize {
        self.entity_chains.len() * self.resource_attributes.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub entity_chain_id: String,
    pub resource_attributes_id: String,
    /// The first requested action; all requested actions are decided together.
    pub action: Action,
    pub decision: Decision,
    #[serde(default)]
    pub obligations: Vec<String>,
}

impl Display for DecisionResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}({} -> {} [{}])",
            self.decision, self.entity_chain_id, self.resource_attributes_id, self.action
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDecisionsRequest {
    #[serde(default)]
    pub decision_requests: Vec<DecisionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDecisionsResponse {
    #[serde(default)]
    pub decision_responses: Vec<DecisionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetEntitlementsRequest {
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Restrict evaluation to these value FQNs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ResourceAttribute>,
    /// Also return every value below an entitled HIERARCHY value.
    #[serde(default)]
    pub with_comprehensive_hierarchy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityEntitlements {
    pub entity_id: String,
    #[serde(default)]
    pub attribute_value_fqns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetEntitlementsResponse {
    #[serde(default)]
    pub entitlements: Vec<EntityEntitlements>,
}

/// A bearer token to decompose into an entity chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub id: String,
    pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenDecisionRequest {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub resource_attributes: Vec<ResourceAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDecisionsByTokenRequest {
    #[serde(default)]
    pub decision_requests: Vec<TokenDecisionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDecisionsByTokenResponse {
    #[serde(default)]
    pub decision_responses: Vec<DecisionResponse>,
}
