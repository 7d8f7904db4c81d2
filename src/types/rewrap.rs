//! Key access (rewrap) request and response types.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::AuthzError;

pub const DEFAULT_ALGORITHM: &str = "rsa:2048";
pub const KEY_ACCESS_WRAPPED: &str = "wrapped";

/// The transport-level rewrap request. `signed_request_token` is a JWT whose
/// `requestBody` claim holds a JSON-encoded [`RewrapRequestBody`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewrapRequest {
    pub signed_request_token: String,
    /// The caller's access token, used by `rewrap_with_bearer`.
    #[serde(default)]
    pub bearer: String,
}

/// A policy binding, either the bare hash or the `{alg, hash}` object form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(untagged)]
pub enum PolicyBinding {
    Hash(String),
    Object {
        #[serde(default)]
        alg: String,
        hash: String,
    },
}

impl PolicyBinding {
    pub fn hash(&self) -> &str {
        match self {
            PolicyBinding::Hash(h) => h,
            PolicyBinding::Object { hash, .. } => hash,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyAccess {
    #[serde(rename = "type", default)]
    pub key_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub protocol: String,
    /// Base64 of the RSA-wrapped data encryption key.
    pub wrapped_key: String,
    pub policy_binding: PolicyBinding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewrapRequestBody {
    pub key_access: KeyAccess,
    /// Base64 of the JSON [`KasPolicy`]. The binding is computed over this string.
    pub policy: String,
    #[serde(default)]
    pub algorithm: String,
    pub client_public_key: String,
    /// Checked against the configured schema version; empty skips the check.
    #[serde(default)]
    pub schema_version: String,
}

impl RewrapRequestBody {
    /// The requested algorithm, falling back to `rsa:2048`.
    pub fn algorithm(&self) -> &str {
        if self.algorithm.is_empty() {
            DEFAULT_ALGORITHM
        } else {
            &self.algorithm
        }
    }

    /// Decode the base64 policy into its JSON form.
    pub fn decode_policy(&self) -> Result<KasPolicy, AuthzError> {
        let raw = STANDARD.decode(self.policy.as_bytes())?;
        serde_json::from_slice(&raw)
            .map_err(|e| AuthzError::InvalidRequest(format!("policy: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataAttribute {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBody {
    #[serde(default)]
    pub data_attributes: Vec<DataAttribute>,
    /// Identities (email, user name, client id) allowed to access the data.
    /// Empty means unrestricted.
    #[serde(default)]
    pub dissem: Vec<String>,
}

/// The data policy embedded in a TDF manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct KasPolicy {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub body: PolicyBody,
}

impl KasPolicy {
    pub fn attribute_fqns(&self) -> Vec<String> {
        self.body
            .data_attributes
            .iter()
            .map(|a| a.attribute.clone())
            .collect()
    }

    /// Base64 of the policy JSON, as carried in rewrap requests.
    pub fn to_base64(&self) -> Result<String, AuthzError> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewrapResponse {
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// The content key wrapped for the client public key.
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String)]
    pub entity_wrapped_key: Vec<u8>,
    pub session_public_key: String,
    pub schema_version: String,
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
