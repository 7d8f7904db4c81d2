use async_trait::async_trait;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use zeroize::Zeroizing;

use super::crypto::{unwrap_key, verify_policy_binding, wrap_key};
use crate::error::AuthzError;
use crate::types::PolicyBinding;

/// Custody of the KAS private key.
#[async_trait]
pub trait Kms: Send + Sync {
    /// Decrypt a wrapped data key and check that it is bound to `policy_b64`.
    /// Fails with `Crypto` on a bad ciphertext or a binding mismatch.
    async fn unwrap(
        &self,
        wrapped_key: &[u8],
        binding: &PolicyBinding,
        policy_b64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, AuthzError>;

    /// Wrap a data key for `recipient`.
    async fn wrap(&self, plaintext: &[u8], recipient: &RsaPublicKey)
    -> Result<Vec<u8>, AuthzError>;
}

/// A KMS holding its RSA key pair in process memory.
#[derive(Clone)]
pub struct LocalKms {
    private_key: RsaPrivateKey,
}

impl LocalKms {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    pub fn generate(bits: usize) -> Result<Self, AuthzError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)?;
        Ok(Self::new(private_key))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, AuthzError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| AuthzError::InvalidKey(format!("KAS private key: {e}")))?;
        Ok(Self::new(private_key))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    pub fn public_key_pem(&self) -> Result<String, AuthzError> {
        self.public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthzError::Crypto(format!("encode public key: {e}")))
    }
}

impl std::fmt::Debug for LocalKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKms").finish_non_exhaustive()
    }
}

#[async_trait]
impl Kms for LocalKms {
    async fn unwrap(
        &self,
        wrapped_key: &[u8],
        binding: &PolicyBinding,
        policy_b64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, AuthzError> {
        let plaintext = unwrap_key(&self.private_key, wrapped_key)?;
        verify_policy_binding(&plaintext, policy_b64, binding.hash())?;
        debug!(event = "Kms", phase = "Unwrap", binding = "verified");
        Ok(plaintext)
    }

    async fn wrap(
        &self,
        plaintext: &[u8],
        recipient: &RsaPublicKey,
    ) -> Result<Vec<u8>, AuthzError> {
        let wrapped = wrap_key(recipient, plaintext)?;
        debug!(event = "Kms", phase = "Wrap", bytes = wrapped.len());
        Ok(wrapped)
    }
}
