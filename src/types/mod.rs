//! Data model types for decisions, entitlements and key access.
//!
//! JSON forms follow protojson naming (camelCase fields, prefixed enum
//! names) so requests can be passed through from a transport layer as is.
//!
//! Canonical string forms:
//! - Attribute definition: `https://<namespace>/attr/<name>`
//! - Attribute value: `https://<namespace>/attr/<name>/value/<value>`
//! - Action: lowercase single word, e.g. `decrypt`

mod action;
mod attribute;
mod decision;
mod entity;
mod fqn;
mod rewrap;
mod subject_mapping;

pub use action::{ACTION_DECRYPT, ACTION_TRANSMIT, Action};
pub use attribute::{AttributeDefinition, AttributeRule, AttributeValue};
pub use decision::{
    Decision, DecisionRequest, DecisionResponse, EntityEntitlements, GetDecisionsByTokenRequest,
    GetDecisionsByTokenResponse, GetDecisionsRequest, GetDecisionsResponse,
    GetEntitlementsRequest, GetEntitlementsResponse, PolicyVersion, ResourceAttribute, Token,
    TokenDecisionRequest,
};
pub use entity::{Entity, EntityChain, EntityType};
pub use fqn::{AttributeDefinitionFqn, AttributeValueFqn};
pub use rewrap::{
    DEFAULT_ALGORITHM, DataAttribute, KEY_ACCESS_WRAPPED, KasPolicy, KeyAccess, PolicyBinding,
    PolicyBody, RewrapRequest, RewrapRequestBody, RewrapResponse,
};
pub use subject_mapping::{
    BooleanOperator, Condition, ConditionGroup, Operator, SubjectConditionSet, SubjectMapping,
    SubjectSet,
};
