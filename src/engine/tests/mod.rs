use super::*;
use crate::error::AuthzError;
use crate::store::InMemoryPolicyStore;
use crate::types::{Entity, GetEntitlementsRequest};
use serde_json::{Value, json};
use yare::parameterized;


const TOPSECRET: &str = "https://example.com/attr/clearance/value/topsecret";
const SECRET: &str = "https://example.com/attr/clearance/value/secret";
const CONFIDENTIAL: &str = "https://example.com/attr/clearance/value/confidential";
const ENG: &str = "https://example.com/attr/dept/value/eng";
const HR: &str = "https://example.com/attr/dept/value/hr";
const FIN: &str = "https://example.com/attr/dept/value/fin";
const USA: &str = "https://example.com/attr/country/value/usa";
const GBR: &str = "https://example.com/attr/country/value/gbr";
const APOLLO: &str = "https://example.com/attr/project/value/apollo";
const LEGACY: &str = "https://example.com/attr/legacy/value/x";
const WATERMARK: &str = "https://example.com/obl/drm/value/watermark";

const TEST_POLICY: &str = r#"{
    "attributes": [
        {
            "fqn": "https://example.com/attr/clearance",
            "rule": "HIERARCHY",
            "values": [{"value": "topsecret"}, {"value": "secret"}, {"value": "confidential"}]
        },
        {
            "fqn": "https://example.com/attr/dept",
            "rule": "ANY_OF",
            "values": [{"value": "eng"}, {"value": "hr"}, {"value": "fin"}]
        },
        {
            "fqn": "https://example.com/attr/country",
            "rule": "ALL_OF",
            "values": [{"value": "usa"}, {"value": "gbr"}]
        },
        {
            "fqn": "https://example.com/attr/project",
            "rule": "ALL_OF",
            "values": [{"value": "apollo", "obligations": ["https://example.com/obl/drm/value/watermark"]}]
        },
        {
            "fqn": "https://example.com/attr/legacy",
            "rule": "UNSPECIFIED",
            "values": [{"value": "x"}]
        }
    ],
    "subjectMappings": [
        {
            "id": "sm-topsecret",
            "attributeValueFqn": "https://example.com/attr/clearance/value/topsecret",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".clearance", "operator": "IN", "subjectExternalValues": ["topsecret"]}]
            }]}]}
        },
        {
            "id": "sm-secret",
            "attributeValueFqn": "https://example.com/attr/clearance/value/secret",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".clearance", "operator": "IN", "subjectExternalValues": ["secret"]}]
            }]}]}
        },
        {
            "id": "sm-confidential",
            "attributeValueFqn": "https://example.com/attr/clearance/value/confidential",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".clearance", "operator": "IN", "subjectExternalValues": ["confidential"]}]
            }]}]}
        },
        {
            "id": "sm-eng",
            "attributeValueFqn": "https://example.com/attr/dept/value/eng",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".groups[]", "operator": "IN", "subjectExternalValues": ["eng"]}]
            }]}]}
        },
        {
            "id": "sm-hr",
            "attributeValueFqn": "https://example.com/attr/dept/value/hr",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".groups[]", "operator": "IN", "subjectExternalValues": ["hr"]}]
            }]}]}
        },
        {
            "id": "sm-usa",
            "attributeValueFqn": "https://example.com/attr/country/value/usa",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".country[]", "operator": "IN", "subjectExternalValues": ["usa"]}]
            }]}]}
        },
        {
            "id": "sm-gbr",
            "attributeValueFqn": "https://example.com/attr/country/value/gbr",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".country[]", "operator": "IN", "subjectExternalValues": ["gbr"]}]
            }]}]}
        },
        {
            "id": "sm-apollo",
            "attributeValueFqn": "https://example.com/attr/project/value/apollo",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".projects[]", "operator": "IN", "subjectExternalValues": ["apollo"]}]
            }]}]},
            "actions": [{"name": "decrypt"}]
        },
        {
            "id": "sm-legacy",
            "attributeValueFqn": "https://example.com/attr/legacy/value/x",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".groups[]", "operator": "IN", "subjectExternalValues": ["legacy"]}]
            }]}]}
        }
    ]
}"#;

/// Fails every snapshot request.
struct UnavailableStore;

impl PolicyStore for UnavailableStore {
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        Err(AuthzError::PolicyStoreUnavailable(
            "backend offline".to_string(),
        ))
    }
}

fn test_store() -> Arc<InMemoryPolicyStore> {
    Arc::new(InMemoryPolicyStore::from_json_str(TEST_POLICY).expect("policy should load"))
}

fn engine() -> DecisionEngine {
    DecisionEngine::with_store(test_store())
}

fn engine_with_semantics(semantics: ChainSemantics) -> DecisionEngine {
    DecisionEngine::new(
        test_store(),
        Arc::new(ClaimsEntityResolver),
        EngineConfig::default().with_chain_semantics(semantics),
    )
    .expect("config should be valid")
}

/// A chain of claims entities with ids `<chain id>-e<n>`.
fn chain(id: &str, claims: &[Value]) -> EntityChain {
    let entities = claims
        .iter()
        .enumerate()
        .map(|(n, c)| Entity::claims(format!("{id}-e{n}"), c.clone()))
        .collect();
    EntityChain::new(id, entities).expect("chain should be valid")
}

fn resource(id: &str, fqns: &[&str]) -> ResourceAttribute {
    ResourceAttribute::new(id, fqns.iter().copied())
}

fn request(
    actions: &[Action],
    chains: Vec<EntityChain>,
    resources: Vec<ResourceAttribute>,
) -> DecisionRequest {
    DecisionRequest {
        actions: actions.to_vec(),
        entity_chains: chains,
        resource_attributes: resources,
    }
}

/// Decide one pair for a single-entity chain.
fn decide(engine: &DecisionEngine, claims: Value, fqns: &[&str], action: Action) -> DecisionResponse {
    let responses = engine
        .get_decisions(&[request(
            &[action],
            vec![chain("ec1", &[claims])],
            vec![resource("ra1", fqns)],
        )])
        .expect("decisions should succeed");
    assert_eq!(responses.len(), 1);
    responses.into_iter().next().expect("one response")
}

fn assert_permit(response: &DecisionResponse) {
    assert_eq!(response.decision, Decision::Permit, "{response}");
}

fn assert_deny(response: &DecisionResponse) {
    assert_eq!(response.decision, Decision::Deny, "{response}");
}

include!("core.rs");
include!("attribute_rules.rs");
include!("entitlements.rs");
include!("tokens.rs");
