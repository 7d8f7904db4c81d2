//! Fully qualified names for attribute definitions and values.
//!
//! Canonical forms:
//! - Definition: `https://<namespace>/attr/<name>`
//! - Value: `https://<namespace>/attr/<name>/value/<value>`
//!
//! The scheme is optional on input. Everything is lowercased, so lookups
//! and comparisons are case-insensitive.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AuthzError;

static VALUE_FQN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?P<ns>[^/\s]+)/attr/(?P<attr>[^/\s]+)/value/(?P<value>[^/\s]+)$")
        .expect("value FQN pattern is valid")
});

static DEFINITION_FQN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?P<ns>[^/\s]+)/attr/(?P<attr>[^/\s]+)$")
        .expect("definition FQN pattern is valid")
});

/// An attribute definition, e.g. `https://example.com/attr/clearance`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeDefinitionFqn {
    namespace: String,
    name: String,
}

impl AttributeDefinitionFqn {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into().to_lowercase(),
            name: name.into().to_lowercase(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the FQN of a value under this definition.
    pub fn value(&self, value: impl Into<String>) -> AttributeValueFqn {
        AttributeValueFqn {
            definition: self.clone(),
            value: value.into().to_lowercase(),
        }
    }
}

impl Display for AttributeDefinitionFqn {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "https://{}/attr/{}", self.namespace, self.name)
    }
}

impl FromStr for AttributeDefinitionFqn {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let caps = DEFINITION_FQN.captures(&lowered).ok_or_else(|| {
            AuthzError::InvalidAttributeFqn(format!(
                "'{s}' (expected format: [https://]namespace/attr/name)"
            ))
        })?;
        Ok(Self::new(&caps["ns"], &caps["attr"]))
    }
}

impl TryFrom<String> for AttributeDefinitionFqn {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributeDefinitionFqn> for String {
    fn from(value: AttributeDefinitionFqn) -> Self {
        value.to_string()
    }
}

/// An attribute value, e.g. `https://example.com/attr/clearance/value/secret`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeValueFqn {
    definition: AttributeDefinitionFqn,
    value: String,
}

impl AttributeValueFqn {
    pub fn definition(&self) -> &AttributeDefinitionFqn {
        &self.definition
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for AttributeValueFqn {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/value/{}", self.definition, self.value)
    }
}

impl FromStr for AttributeValueFqn {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let caps = VALUE_FQN.captures(&lowered).ok_or_else(|| {
            AuthzError::InvalidAttributeFqn(format!(
                "'{s}' (expected format: [https://]namespace/attr/name/value/value)"
            ))
        })?;
        Ok(AttributeDefinitionFqn::new(&caps["ns"], &caps["attr"]).value(&caps["value"]))
    }
}

impl TryFrom<String> for AttributeValueFqn {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributeValueFqn> for String {
    fn from(value: AttributeValueFqn) -> Self {
        value.to_string()
    }
}
