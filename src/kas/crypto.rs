//! RSA-OAEP key wrapping and policy binding primitives.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::AuthzError;

type HmacSha256 = Hmac<Sha256>;

/// Parse an RSA public key from SPKI (`PUBLIC KEY`) or PKCS#1
/// (`RSA PUBLIC KEY`) PEM.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, AuthzError> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(AuthzError::InvalidKey("client public key is empty".to_string()));
    }
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| AuthzError::InvalidKey(format!("client public key: {e}")))
}

pub fn wrap_key(recipient: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, AuthzError> {
    let mut rng = rand::thread_rng();
    Ok(recipient.encrypt(&mut rng, Oaep::new::<Sha1>(), plaintext)?)
}

pub fn unwrap_key(
    private_key: &RsaPrivateKey,
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, AuthzError> {
    let plaintext = private_key.decrypt(Oaep::new::<Sha1>(), wrapped)?;
    Ok(Zeroizing::new(plaintext))
}

fn binding_mac(key: &[u8], policy_b64: &str) -> Result<HmacSha256, AuthzError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AuthzError::Crypto(format!("binding key: {e}")))?;
    mac.update(policy_b64.as_bytes());
    Ok(mac)
}

/// `base64(hex(HMAC-SHA256(key, policy_b64)))`.
pub fn policy_binding(key: &[u8], policy_b64: &str) -> Result<String, AuthzError> {
    let digest = binding_mac(key, policy_b64)?.finalize().into_bytes();
    Ok(STANDARD.encode(hex::encode(digest)))
}

/// Check a binding produced by [`policy_binding`], in constant time.
pub fn verify_policy_binding(
    key: &[u8],
    policy_b64: &str,
    binding: &str,
) -> Result<(), AuthzError> {
    let hex_digest = STANDARD
        .decode(binding.trim())
        .map_err(|e| AuthzError::Crypto(format!("policy binding is not base64: {e}")))?;
    let expected = hex::decode(hex_digest)?;
    binding_mac(key, policy_b64)?
        .verify_slice(&expected)
        .map_err(|_| AuthzError::Crypto("policy binding mismatch".to_string()))
}
