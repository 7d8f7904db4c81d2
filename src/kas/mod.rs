//! Key access: releasing TDF data keys to entitled callers.
//!
//! A rewrap request carries a data encryption key wrapped for the KAS public
//! key plus the policy it is bound to. [`RewrapService`] asks the decision
//! engine whether the caller may `decrypt` under that policy and, only then,
//! has the [`Kms`] unwrap the key and wrap it again for the caller's own
//! public key.

pub mod crypto;
mod kms;
mod rewrap;

pub use kms::{Kms, LocalKms};
pub use rewrap::{BEARER_CHAIN_ID, REQUEST_BODY_CLAIM, RewrapService, request_body};
