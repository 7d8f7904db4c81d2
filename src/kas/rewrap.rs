use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::crypto::parse_public_key_pem;
use super::kms::Kms;
use crate::engine::DecisionEngine;
use crate::error::AuthzError;
use crate::timers::as_millis_f64;
use crate::token::{chain_from_token, decode_unverified_claims};
use crate::types::{
    Action, DecisionRequest, Entity, EntityChain, EntityType, KEY_ACCESS_WRAPPED,
    ResourceAttribute, RewrapRequest, RewrapRequestBody, RewrapResponse, Token,
};

/// JWT claim of the signed request token carrying the request body.
pub const REQUEST_BODY_CLAIM: &str = "requestBody";

/// Chain id of callers built from a rewrap request's bearer token.
pub const BEARER_CHAIN_ID: &str = "bearer";

/// Claims naming who an entity is, matched against dissemination lists.
const IDENTITY_CLAIMS: &[&str] = &[
    "email",
    "emailAddress",
    "preferred_username",
    "userName",
    "username",
    "azp",
    "clientId",
    "client_id",
    "sub",
];

/// Releases data keys to entitled callers by rewrapping them for the
/// caller's public key.
#[derive(Clone)]
pub struct RewrapService {
    engine: DecisionEngine,
    kms: Arc<dyn Kms>,
}

impl RewrapService {
    pub fn new(engine: DecisionEngine, kms: Arc<dyn Kms>) -> Self {
        Self { engine, kms }
    }

    /// Rewrap the key in `request` for `caller`. Nothing derived from the
    /// key is returned unless the caller is permitted to decrypt.
    pub async fn rewrap(
        &self,
        request: &RewrapRequest,
        caller: &EntityChain,
    ) -> Result<RewrapResponse, AuthzError> {
        let started = Instant::now();
        let mut policy_id = String::new();
        let result = self.rewrap_inner(request, caller, &mut policy_id).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => info!(
                event = "Rewrap",
                phase = "Done",
                caller = %caller.id,
                policy = %policy_id,
                elapsed_ms = as_millis_f64(elapsed)
            ),
            Err(e) => warn!(
                event = "Rewrap",
                phase = "Failed",
                caller = %caller.id,
                policy = %policy_id,
                code = e.code(),
                error = %e
            ),
        }

        #[cfg(feature = "observability")]
        crate::metrics::record_rewrap(
            elapsed,
            policy_id,
            result.as_ref().err().map(|e| e.code().to_string()),
        );

        result
    }

    /// Rewrap for the caller carried in `request.bearer`, decomposed with
    /// the configured JWT rules.
    pub async fn rewrap_with_bearer(
        &self,
        request: &RewrapRequest,
    ) -> Result<RewrapResponse, AuthzError> {
        if request.bearer.trim().is_empty() {
            return Err(AuthzError::InvalidToken(
                "rewrap request has no bearer token".to_string(),
            ));
        }
        let token = Token {
            id: BEARER_CHAIN_ID.to_string(),
            jwt: request.bearer.clone(),
        };
        let caller = chain_from_token(&token, &self.engine.config().jwt_decomposition)?;
        self.rewrap(request, &caller).await
    }

    async fn rewrap_inner(
        &self,
        request: &RewrapRequest,
        caller: &EntityChain,
        policy_id: &mut String,
    ) -> Result<RewrapResponse, AuthzError> {
        let config = self.engine.config();
        let body = request_body(&request.signed_request_token)?;
        check_schema_version(&body.schema_version, &config.schema_version)?;

        let algorithm = if body.algorithm.is_empty() {
            config.default_algorithm.as_str()
        } else {
            body.algorithm()
        };
        if !algorithm.starts_with("rsa:") {
            return Err(AuthzError::InvalidKey(format!(
                "unsupported algorithm '{algorithm}'"
            )));
        }
        let client_key = parse_public_key_pem(&body.client_public_key)?;

        let key_type = body.key_access.key_type.as_str();
        if !key_type.is_empty() && key_type != KEY_ACCESS_WRAPPED {
            return Err(AuthzError::InvalidRequest(format!(
                "unsupported key access type '{key_type}'"
            )));
        }

        let policy = body.decode_policy()?;
        policy_id.clone_from(&policy.uuid);
        caller.validate()?;

        if !policy.body.dissem.is_empty() && !on_dissemination_list(&policy.body.dissem, caller) {
            return Err(AuthzError::PermissionDenied(format!(
                "caller '{}' is not on the dissemination list of policy '{}'",
                caller.id, policy.uuid
            )));
        }

        let fqns = policy.attribute_fqns();
        if fqns.is_empty() {
            debug!(event = "Rewrap", phase = "Decision", policy = %policy.uuid, "no data attributes");
        } else {
            let decision_request = DecisionRequest {
                actions: vec![Action::decrypt()],
                entity_chains: vec![caller.clone()],
                resource_attributes: vec![ResourceAttribute::new(policy.uuid.clone(), fqns)],
            };
            let engine = self.engine.clone();
            let responses =
                tokio::task::spawn_blocking(move || engine.get_decisions(&[decision_request]))
                    .await??;
            let permitted = responses.first().is_some_and(|r| r.decision.is_permit());
            if !permitted {
                return Err(AuthzError::PermissionDenied(format!(
                    "caller '{}' may not decrypt under policy '{}'",
                    caller.id, policy.uuid
                )));
            }
        }

        let wrapped = STANDARD.decode(body.key_access.wrapped_key.as_bytes())?;
        let dek = self
            .bounded(
                "unwrap",
                self.kms
                    .unwrap(&wrapped, &body.key_access.policy_binding, &body.policy),
            )
            .await?;
        let entity_wrapped_key = self
            .bounded("wrap", self.kms.wrap(&dek, &client_key))
            .await?;

        let mut metadata = BTreeMap::new();
        metadata.insert("policyId".to_string(), Value::String(policy.uuid.clone()));
        metadata.insert(
            "keyAccessUrl".to_string(),
            Value::String(body.key_access.url.clone()),
        );

        Ok(RewrapResponse {
            metadata,
            entity_wrapped_key,
            session_public_key: body.client_public_key,
            schema_version: config.schema_version.clone(),
        })
    }

    /// Run a KMS call under the configured timeout. Timeouts and KMS
    /// failures both surface as `Crypto`.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, AuthzError>>,
    ) -> Result<T, AuthzError> {
        let timeout = self.engine.config().kms_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(AuthzError::Crypto(msg))) => Err(AuthzError::Crypto(msg)),
            Ok(Err(e)) => Err(AuthzError::Crypto(format!("kms {operation}: {e}"))),
            Err(_) => Err(AuthzError::Crypto(format!(
                "kms {operation} timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// A client may ask for any schema version with the same major version as
/// the one configured. An empty version is accepted.
fn check_schema_version(requested: &str, supported: &str) -> Result<(), AuthzError> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Ok(());
    }
    let major = |v: &str| {
        v.trim_start_matches('v')
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string()
    };
    if major(requested) != major(supported) {
        return Err(AuthzError::InvalidRequest(format!(
            "unsupported schema version '{requested}', expected {supported}"
        )));
    }
    Ok(())
}

/// Identity values of an entity: its identifier for the plain types, the
/// identity claims of a claims blob or token. Never the correlation `id`.
fn identities(entity: &Entity) -> Vec<String> {
    fn from_claims(claims: &Map<String, Value>) -> Vec<String> {
        IDENTITY_CLAIMS
            .iter()
            .filter_map(|claim| claims.get(*claim).and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    match &entity.entity_type {
        Some(
            EntityType::EmailAddress(value)
            | EntityType::UserName(value)
            | EntityType::ClientId(value)
            | EntityType::Uuid(value),
        ) => vec![value.clone()],
        Some(
            EntityType::Claims(Value::Object(claims)) | EntityType::Custom(Value::Object(claims)),
        ) => from_claims(claims),
        Some(EntityType::Jwt(jwt)) => decode_unverified_claims(jwt)
            .map(|claims| from_claims(&claims))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn on_dissemination_list(dissem: &[String], caller: &EntityChain) -> bool {
    caller
        .entities
        .iter()
        .flat_map(identities)
        .any(|identity| dissem.iter().any(|d| d.eq_ignore_ascii_case(&identity)))
}

/// Read the request body from the signed request token.
pub fn request_body(signed_request_token: &str) -> Result<RewrapRequestBody, AuthzError> {
    let mut claims = decode_unverified_claims(signed_request_token)?;
    match claims.remove(REQUEST_BODY_CLAIM) {
        Some(Value::String(text)) => Ok(serde_json::from_str(&text)?),
        Some(object @ Value::Object(_)) => Ok(serde_json::from_value(object)?),
        Some(_) => Err(AuthzError::InvalidRequest(format!(
            "claim '{REQUEST_BODY_CLAIM}' is neither a string nor an object"
        ))),
        None => Err(AuthzError::InvalidRequest(format!(
            "signed request token has no '{REQUEST_BODY_CLAIM}' claim"
        ))),
    }
}
