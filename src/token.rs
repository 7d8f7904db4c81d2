//! Bearer token decomposition into entity chains.
//!
//! Tokens are decoded without signature verification: authentication is the
//! transport's job, this module only reads claims from an already trusted token.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ClaimEntityType, JwtDecompositionRules};
use crate::error::AuthzError;
use crate::types::{Entity, EntityChain, EntityType, Token};

/// Read the claims of a JWT without verifying its signature or expiry.
pub fn decode_unverified_claims(jwt: &str) -> Result<Map<String, Value>, AuthzError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Map<String, Value>>(jwt.trim(), &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

fn claim_entity(
    claims: &Map<String, Value>,
    selector: &str,
    entity_type: ClaimEntityType,
    id: String,
) -> Result<Entity, AuthzError> {
    let value = claims.get(selector).ok_or_else(|| {
        AuthzError::InvalidToken(format!("claim '{selector}' not found in token"))
    })?;

    let as_string = || {
        value.as_str().map(str::to_string).ok_or_else(|| {
            AuthzError::InvalidToken(format!("claim '{selector}' is not a string"))
        })
    };

    let entity_type = match entity_type {
        ClaimEntityType::ClientId => EntityType::ClientId(as_string()?),
        ClaimEntityType::UserName => EntityType::UserName(as_string()?),
        ClaimEntityType::EmailAddress => EntityType::EmailAddress(as_string()?),
        ClaimEntityType::Uuid => EntityType::Uuid(as_string()?),
        ClaimEntityType::RemoteClaimsUrl => EntityType::RemoteClaimsUrl(as_string()?),
        ClaimEntityType::Claims => EntityType::Claims(value.clone()),
        ClaimEntityType::Custom => EntityType::Custom(value.clone()),
    };
    Ok(Entity::new(id, entity_type))
}

/// Turn a token into entities according to `rules`. Entity ids are
/// `jwtentity-<n>` in rule order.
pub fn entities_from_token(
    jwt: &str,
    rules: &JwtDecompositionRules,
) -> Result<Vec<Entity>, AuthzError> {
    let claims = decode_unverified_claims(jwt)?;
    let mut entities = Vec::new();

    for rule in &rules.always_selectors {
        let id = format!("jwtentity-{}", entities.len());
        entities.push(claim_entity(&claims, &rule.selector, rule.entity_type, id)?);
    }

    for rule in &rules.conditional_selectors {
        let found = claims.get(&rule.if_selector);
        match (rule.present, found) {
            (true, None) => {
                debug!(
                    event = "TokenDecomposition",
                    phase = "Skip",
                    if_selector = %rule.if_selector,
                    reason = "required claim absent"
                );
                continue;
            }
            (false, Some(_)) => {
                debug!(
                    event = "TokenDecomposition",
                    phase = "Skip",
                    if_selector = %rule.if_selector,
                    reason = "claim must be absent"
                );
                continue;
            }
            _ => {}
        }
        if let Some(found) = found {
            if !rule.equal_to.is_empty() && found.as_str() != Some(rule.equal_to.as_str()) {
                debug!(
                    event = "TokenDecomposition",
                    phase = "Skip",
                    if_selector = %rule.if_selector,
                    reason = "claim value mismatch"
                );
                continue;
            }
        }
        let id = format!("jwtentity-{}", entities.len());
        entities.push(claim_entity(&claims, &rule.selector, rule.entity_type, id)?);
    }

    info!(
        event = "TokenDecomposition",
        phase = "Done",
        entities = entities.len()
    );
    Ok(entities)
}

/// Build the entity chain for one token. The chain id is the token id.
pub fn chain_from_token(
    token: &Token,
    rules: &JwtDecompositionRules,
) -> Result<EntityChain, AuthzError> {
    let entities = entities_from_token(&token.jwt, rules)?;
    EntityChain::new(token.id.clone(), entities)
}


#[cfg(test)]
mod tests {
    use super::test_tokens::token;
    use super::*;
    use crate::config::{ConditionalJwtSelector, JwtSelector};
    use serde_json::json;

    fn rules_with_username() -> JwtDecompositionRules {
        JwtDecompositionRules {
            always_selectors: vec![JwtSelector {
                selector: "azp".into(),
                entity_type: ClaimEntityType::ClientId,
            }],
            conditional_selectors: vec![ConditionalJwtSelector {
                selector: "preferred_username".into(),
                entity_type: ClaimEntityType::UserName,
                if_selector: "client_id".into(),
                present: false,
                equal_to: String::new(),
            }],
        }
    }

    #[test]
    fn test_decode_ignores_signature_and_expiry() {
        let jwt = token(json!({"azp": "tdf-client", "exp": 1}));
        let claims = decode_unverified_claims(&jwt).unwrap();
        assert_eq!(claims["azp"], "tdf-client");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_unverified_claims("not.a.jwt"),
            Err(AuthzError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_default_rules_yield_client_entity() {
        let jwt = token(json!({"azp": "tdf-client", "preferred_username": "alice"}));
        let entities = entities_from_token(&jwt, &JwtDecompositionRules::default()).unwrap();
        assert_eq!(entities, vec![Entity::client_id("jwtentity-0", "tdf-client")]);
    }

    #[test]
    fn test_conditional_rule_applies_when_claim_absent() {
        let jwt = token(json!({"azp": "tdf-client", "preferred_username": "alice"}));
        let entities = entities_from_token(&jwt, &rules_with_username()).unwrap();
        assert_eq!(
            entities,
            vec![
                Entity::client_id("jwtentity-0", "tdf-client"),
                Entity::user_name("jwtentity-1", "alice"),
            ]
        );
    }

    #[test]
    fn test_conditional_rule_skipped_when_claim_present() {
        let jwt = token(json!({
            "azp": "tdf-client",
            "client_id": "service",
            "preferred_username": "service-account-tdf"
        }));
        let entities = entities_from_token(&jwt, &rules_with_username()).unwrap();
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_conditional_equal_to() {
        let mut rules = rules_with_username();
        rules.conditional_selectors[0].present = true;
        rules.conditional_selectors[0].if_selector = "typ".into();
        rules.conditional_selectors[0].equal_to = "user".into();

        let matching = token(json!({"azp": "c", "typ": "user", "preferred_username": "bob"}));
        let other = token(json!({"azp": "c", "typ": "service", "preferred_username": "bob"}));
        assert_eq!(entities_from_token(&matching, &rules).unwrap().len(), 2);
        assert_eq!(entities_from_token(&other, &rules).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_always_claim_is_an_error() {
        let jwt = token(json!({"sub": "alice"}));
        assert!(matches!(
            entities_from_token(&jwt, &JwtDecompositionRules::default()),
            Err(AuthzError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_claims_entity_type_keeps_json() {
        let rules = JwtDecompositionRules {
            always_selectors: vec![JwtSelector {
                selector: "realm_access".into(),
                entity_type: ClaimEntityType::Claims,
            }],
            conditional_selectors: vec![],
        };
        let jwt = token(json!({"realm_access": {"roles": ["admin"]}}));
        let entities = entities_from_token(&jwt, &rules).unwrap();
        assert_eq!(
            entities[0].entity_type,
            Some(EntityType::Claims(json!({"roles": ["admin"]})))
        );
    }

    #[test]
    fn test_chain_from_token_uses_token_id() {
        let jwt = token(json!({"azp": "tdf-client"}));
        let chain = chain_from_token(
            &Token {
                id: "tok1".into(),
                jwt,
            },
            &JwtDecompositionRules::default(),
        )
        .unwrap();
        assert_eq!(chain.id, "tok1");
        assert_eq!(chain.entities.len(), 1);
    }

    #[test]
    fn test_token_without_entities_is_invalid() {
        let rules = JwtDecompositionRules {
            always_selectors: vec![],
            conditional_selectors: vec![],
        };
        let jwt = token(json!({"azp": "tdf-client"}));
        let result = chain_from_token(&Token { id: "t".into(), jwt }, &rules);
        assert!(matches!(result, Err(AuthzError::InvalidEntity(_))));
    }
}
