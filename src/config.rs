//! Engine and service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::AuthzError;
use crate::types::DEFAULT_ALGORITHM;

pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";
pub const DEFAULT_KMS_TIMEOUT_MS: u64 = 5_000;

/// How per-entity results combine into one decision for an entity chain.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChainSemantics {
    /// Every entity in the chain must satisfy every attribute group.
    #[default]
    AllEntities,
    /// At least one entity must satisfy every attribute group on its own.
    AnyEntity,
}

/// The entity type a JWT claim is turned into.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ClaimEntityType {
    ClientId,
    UserName,
    EmailAddress,
    Uuid,
    Claims,
    Custom,
    RemoteClaimsUrl,
}

/// Always turn claim `selector` into an entity of `entity_type`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct JwtSelector {
    pub selector: String,
    #[serde(rename = "entitytype")]
    pub entity_type: ClaimEntityType,
}

/// Turn claim `selector` into an entity only when claim `if_selector` is
/// present (or absent, with `present = false`) and, if set, equals `equal_to`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ConditionalJwtSelector {
    pub selector: String,
    #[serde(rename = "entitytype")]
    pub entity_type: ClaimEntityType,
    #[serde(rename = "ifselector")]
    pub if_selector: String,
    #[serde(default)]
    pub present: bool,
    #[serde(rename = "equalto", default)]
    pub equal_to: String,
}

/// Rules for decomposing a bearer token into an entity chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct JwtDecompositionRules {
    #[serde(rename = "alwaysselectors", default)]
    pub always_selectors: Vec<JwtSelector>,
    #[serde(rename = "conditionalselectors", default)]
    pub conditional_selectors: Vec<ConditionalJwtSelector>,
}

impl Default for JwtDecompositionRules {
    /// The authorized party (`azp`) becomes a client id entity.
    fn default() -> Self {
        Self {
            always_selectors: vec![JwtSelector {
                selector: "azp".to_string(),
                entity_type: ClaimEntityType::ClientId,
            }],
            conditional_selectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub chain_semantics: ChainSemantics,
    /// Upper bound for each KMS call during rewrap.
    pub kms_timeout_ms: u64,
    /// Reported in rewrap responses.
    pub schema_version: String,
    /// Assumed when a rewrap request names no algorithm.
    pub default_algorithm: String,
    pub jwt_decomposition: JwtDecompositionRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_semantics: ChainSemantics::default(),
            kms_timeout_ms: DEFAULT_KMS_TIMEOUT_MS,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            default_algorithm: DEFAULT_ALGORITHM.to_string(),
            jwt_decomposition: JwtDecompositionRules::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, AuthzError> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.kms_timeout_ms == 0 {
            return Err(AuthzError::Config(
                "kms_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.schema_version.trim().is_empty() {
            return Err(AuthzError::Config("schema_version is empty".to_string()));
        }
        if !self.default_algorithm.starts_with("rsa:") {
            return Err(AuthzError::Config(format!(
                "unsupported default algorithm '{}'",
                self.default_algorithm
            )));
        }
        Ok(())
    }

    pub fn kms_timeout(&self) -> Duration {
        Duration::from_millis(self.kms_timeout_ms)
    }

    pub fn with_chain_semantics(mut self, semantics: ChainSemantics) -> Self {
        self.chain_semantics = semantics;
        self
    }

    pub fn with_kms_timeout(mut self, timeout: Duration) -> Self {
        self.kms_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
