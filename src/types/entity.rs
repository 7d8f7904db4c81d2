//! Entities and entity chains.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::AuthzError;

/// The identity representation carried by an entity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    EmailAddress(String),
    UserName(String),
    RemoteClaimsUrl(String),
    Uuid(String),
    /// A raw (possibly unverified) JWT whose payload is the entity's claims.
    Jwt(String),
    /// A claims blob.
    Claims(Value),
    /// A custom extension object.
    Custom(Value),
    ClientId(String),
}

impl EntityType {
    /// The protojson field name of this variant.
    pub fn field_name(&self) -> &'static str {
        match self {
            EntityType::EmailAddress(_) => "emailAddress",
            EntityType::UserName(_) => "userName",
            EntityType::RemoteClaimsUrl(_) => "remoteClaimsUrl",
            EntityType::Uuid(_) => "uuid",
            EntityType::Jwt(_) => "jwt",
            EntityType::Claims(_) => "claims",
            EntityType::Custom(_) => "custom",
            EntityType::ClientId(_) => "clientId",
        }
    }
}

/// A single entity. `id` is ephemeral and only correlates request and response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub entity_type: Option<EntityType>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type: Some(entity_type),
        }
    }

    pub fn email(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(id, EntityType::EmailAddress(email.into()))
    }

    pub fn user_name(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self::new(id, EntityType::UserName(user_name.into()))
    }

    pub fn client_id(id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::new(id, EntityType::ClientId(client_id.into()))
    }

    pub fn claims(id: impl Into<String>, claims: Value) -> Self {
        Self::new(id, EntityType::Claims(claims))
    }

    pub fn jwt(id: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self::new(id, EntityType::Jwt(jwt.into()))
    }

    /// Fail with `InvalidEntity` when the `entity_type` oneof is missing.
    pub fn validate(&self) -> Result<&EntityType, AuthzError> {
        self.entity_type.as_ref().ok_or_else(|| {
            AuthzError::InvalidEntity(format!("entity '{}' has no entity type", self.id))
        })
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.entity_type {
            Some(t) => write!(f, "{}({})", t.field_name(), self.id),
            None => write!(f, "unknown({})", self.id),
        }
    }
}

/// An ordered list of entities (person and non-person) representing one principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EntityChain {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl EntityChain {
    /// Build a chain, rejecting empty entity lists and untyped entities.
    pub fn new(id: impl Into<String>, entities: Vec<Entity>) -> Result<Self, AuthzError> {
        let chain = Self {
            id: id.into(),
            entities,
        };
        chain.validate()?;
        Ok(chain)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.entities.is_empty() {
            return Err(AuthzError::InvalidEntity(format!(
                "entity chain '{}' has no entities",
                self.id
            )));
        }
        for entity in &self.entities {
            entity.validate()?;
        }
        Ok(())
    }

    /// Ids of the entities in the chain, in order.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.id.as_str())
    }
}
