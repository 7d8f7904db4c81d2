//! Attribute-based access decisions and key access for TDF-protected data.
//!
//! - [`DecisionEngine`] answers "may these entities perform this action on
//!   data carrying these attributes", using attribute definitions and subject
//!   mappings from a [`PolicyStore`].
//! - [`RewrapService`] releases a data key to an entitled caller.
//! - [`AuthorizationService`] exposes both as async RPC-shaped calls.

pub use config::{ChainSemantics, EngineConfig, JwtDecompositionRules};
pub use engine::DecisionEngine;
pub use error::AuthzError;
pub use kas::{Kms, LocalKms, RewrapService};
pub use resolver::{ClaimsEntityResolver, EntitlementResolver, Entitlements, EntityResolver};
pub use service::AuthorizationService;
pub use store::{InMemoryPolicyStore, PolicyDocument, PolicySnapshot, PolicyStore};
pub use types::*;

pub mod config;
mod condition;
mod engine;
mod error;
mod flatten;
pub mod kas;
#[cfg(feature = "observability")]
pub mod metrics;
pub mod resolver;
mod rules;
pub mod service;
pub mod store;
mod timers;
pub mod token;
pub mod types;

