//! Policy data access.
//!
//! [`PolicyStore`] is the seam to wherever attribute definitions and subject
//! mappings live. Engines take one [`PolicySnapshot`] per batch and evaluate
//! against it without holding any lock, so a concurrent reload never changes
//! data under a running evaluation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::AuthzError;
use crate::types::{
    AttributeDefinition, AttributeDefinitionFqn, AttributeRule, AttributeValueFqn, PolicyVersion,
    SubjectMapping,
};

/// The serialized form of a policy snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub subject_mappings: Vec<SubjectMapping>,
}

/// An immutable, indexed view of the policy data.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    definitions: HashMap<AttributeDefinitionFqn, AttributeDefinition>,
    mappings: Vec<SubjectMapping>,
    mappings_by_value: HashMap<AttributeValueFqn, Vec<usize>>,
    version: PolicyVersion,
}

impl PolicySnapshot {
    /// Index a document. `source` is hashed for the snapshot version.
    pub fn from_document(document: PolicyDocument, source: &[u8]) -> Result<Self, AuthzError> {
        let mut definitions = HashMap::with_capacity(document.attributes.len());
        for definition in document.attributes {
            let fqn = definition.fqn.clone();
            if definitions.insert(fqn.clone(), definition).is_some() {
                return Err(AuthzError::Config(format!(
                    "duplicate attribute definition '{fqn}'"
                )));
            }
        }

        let mut mappings_by_value: HashMap<AttributeValueFqn, Vec<usize>> = HashMap::new();
        for (idx, mapping) in document.subject_mappings.iter().enumerate() {
            let value_fqn = &mapping.attribute_value_fqn;
            let known = definitions
                .get(value_fqn.definition())
                .is_some_and(|def: &AttributeDefinition| def.rank_of(value_fqn).is_some());
            if !known {
                return Err(AuthzError::Config(format!(
                    "subject mapping '{}' references unknown value '{value_fqn}'",
                    mapping.id
                )));
            }
            mappings_by_value
                .entry(value_fqn.clone())
                .or_default()
                .push(idx);
        }

        Ok(Self {
            definitions,
            mappings: document.subject_mappings,
            mappings_by_value,
            version: PolicyVersion {
                hash: format!("{:x}", Sha256::digest(source)),
                loaded_at: Utc::now().to_rfc3339(),
            },
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, AuthzError> {
        let document: PolicyDocument = serde_json::from_str(text)
            .map_err(|e| AuthzError::Config(format!("policy document: {e}")))?;
        Self::from_document(document, text.as_bytes())
    }

    pub fn version(&self) -> &PolicyVersion {
        &self.version
    }

    pub fn definition(&self, fqn: &AttributeDefinitionFqn) -> Option<&AttributeDefinition> {
        self.definitions.get(fqn)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions.values()
    }

    pub fn rule(&self, fqn: &AttributeDefinitionFqn) -> Option<AttributeRule> {
        self.definitions.get(fqn).map(|d| d.rule)
    }

    /// Every mapping, in document order.
    pub fn subject_mappings(&self) -> &[SubjectMapping] {
        &self.mappings
    }

    /// Mappings entitling `value`, in document order.
    pub fn subject_mappings_for(&self, value: &AttributeValueFqn) -> Vec<&SubjectMapping> {
        self.mappings_by_value
            .get(value)
            .map(|idxs| idxs.iter().map(|&i| &self.mappings[i]).collect())
            .unwrap_or_default()
    }

    /// Ordered value FQNs of a HIERARCHY definition, highest rank first.
    /// Empty for definitions with any other rule.
    pub fn hierarchy(&self, fqn: &AttributeDefinitionFqn) -> Vec<AttributeValueFqn> {
        match self.definitions.get(fqn) {
            Some(def) if def.rule == AttributeRule::Hierarchy => def.value_fqns(),
            _ => Vec::new(),
        }
    }
}

/// Source of policy data. Implementors only have to provide [`snapshot`];
/// the lookups read from a fresh snapshot by default.
///
/// [`snapshot`]: PolicyStore::snapshot
pub trait PolicyStore: Send + Sync {
    /// The current snapshot. Fails with `PolicyStoreUnavailable` when no
    /// policy data can be obtained.
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError>;

    fn get_attribute_definition(
        &self,
        fqn: &AttributeDefinitionFqn,
    ) -> Result<Option<AttributeDefinition>, AuthzError> {
        Ok(self.snapshot()?.definition(fqn).cloned())
    }

    fn get_attribute_rule(
        &self,
        fqn: &AttributeDefinitionFqn,
    ) -> Result<Option<AttributeRule>, AuthzError> {
        Ok(self.snapshot()?.rule(fqn))
    }

    /// Mappings for one value, or all mappings when `value` is `None`.
    fn get_subject_mappings(
        &self,
        value: Option<&AttributeValueFqn>,
    ) -> Result<Vec<SubjectMapping>, AuthzError> {
        let snapshot = self.snapshot()?;
        Ok(match value {
            Some(value) => snapshot
                .subject_mappings_for(value)
                .into_iter()
                .cloned()
                .collect(),
            None => snapshot.subject_mappings().to_vec(),
        })
    }

    fn get_namespace_hierarchy(
        &self,
        fqn: &AttributeDefinitionFqn,
    ) -> Result<Vec<AttributeValueFqn>, AuthzError> {
        Ok(self.snapshot()?.hierarchy(fqn))
    }
}

/// An in-process store holding the current snapshot behind an `Arc` swap.
/// Cloneable and thread-safe.
#[derive(Clone)]
pub struct InMemoryPolicyStore {
    inner: Arc<RwLock<Arc<PolicySnapshot>>>,
}

impl InMemoryPolicyStore {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn from_document(document: PolicyDocument) -> Result<Self, AuthzError> {
        let source = serde_json::to_vec(&document)?;
        Ok(Self::new(PolicySnapshot::from_document(document, &source)?))
    }

    pub fn from_json_str(text: &str) -> Result<Self, AuthzError> {
        Ok(Self::new(PolicySnapshot::from_json_str(text)?))
    }

    /// Replace the policy data. The old snapshot stays valid for readers
    /// that already hold it. On error the current snapshot is kept.
    pub fn reload_from_str(&self, text: &str) -> Result<(), AuthzError> {
        let snapshot = PolicySnapshot::from_json_str(text)?;
        self.swap(snapshot)
    }

    pub fn reload_from_document(&self, document: PolicyDocument) -> Result<(), AuthzError> {
        let source = serde_json::to_vec(&document)?;
        self.swap(PolicySnapshot::from_document(document, &source)?)
    }

    pub fn current_version(&self) -> Result<PolicyVersion, AuthzError> {
        Ok(self.snapshot()?.version().clone())
    }

    fn swap(&self, snapshot: PolicySnapshot) -> Result<(), AuthzError> {
        let hash = snapshot.version().hash.clone();
        let definitions = snapshot.definitions.len();
        let mappings = snapshot.mappings.len();
        {
            let mut guard = self.inner.write()?;
            *guard = Arc::new(snapshot);
        }

        info!(
            event = "Reload",
            hash = %hash,
            definitions = definitions,
            subject_mappings = mappings
        );

        #[cfg(feature = "observability")]
        crate::metrics::record_reload(hash);

        Ok(())
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        let guard = self.inner.read()?;
        debug!(event = "Snapshot", hash = %guard.version().hash);
        Ok(Arc::clone(&guard))
    }
}
