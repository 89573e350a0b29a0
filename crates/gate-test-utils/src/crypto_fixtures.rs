//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that can sign JWTs and publish
//! themselves as JWKs. The same seed always produces the same keypair.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Ed25519 keypair with a key ID, for signing test tokens.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "key-1");
/// let jwks = jwks_json(&[&keypair]);
/// let token = keypair.sign(&serde_json::json!({ "sub": "alice" }));
/// ```
#[derive(Clone)]
pub struct TestKeypair {
    kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Create a deterministic keypair from `seed`.
    ///
    /// # Panics
    /// Panics if ring rejects the derived seed (never for 32-byte seeds).
    pub fn new(seed: u8, kid: &str) -> Self {
        Self::try_new(seed, kid).expect("Failed to create test keypair")
    }

    /// Fallible variant of [`TestKeypair::new`].
    pub fn try_new(seed: u8, kid: &str) -> Result<Self, FixtureError> {
        let seed_bytes = seed_bytes(seed);

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).map_err(|e| {
            FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e))
        })?;

        Ok(Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key, base64url without padding (the JWK `x` value).
    pub fn public_key_b64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.public_key_bytes)
    }

    /// Public key as an OKP/Ed25519 JWK.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": self.public_key_b64url(),
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    /// Sign `claims` as an EdDSA JWT with this keypair's `kid` in the header.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.encode_with(&header, claims)
    }

    /// Sign `claims` without a `kid` header.
    pub fn sign_without_kid(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        self.encode_with(&header, claims)
    }

    fn encode_with(&self, header: &Header, claims: &Value) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        encode(header, claims, &encoding_key).expect("Failed to sign token")
    }
}

/// JWKS document (`{"keys": [...]}`) publishing the given keypairs.
pub fn jwks_json(keypairs: &[&TestKeypair]) -> Value {
    json!({
        "keys": keypairs.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    // Create deterministic 32-byte seed from input
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// Ring doesn't expose PKCS#8 for a seeded keypair, so it is built by hand.
/// This is a test-only utility.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // Outer SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // AlgorithmIdentifier: SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // privateKey: OCTET STRING { OCTET STRING (32-byte seed) }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(1, "k");
        let b = TestKeypair::new(1, "k");

        assert_eq!(a.public_key_b64url(), b.public_key_b64url());
        assert_eq!(a.private_key_pkcs8, b.private_key_pkcs8);
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let a = TestKeypair::new(1, "k");
        let b = TestKeypair::new(2, "k");

        assert_ne!(a.public_key_b64url(), b.public_key_b64url());
    }

    #[test]
    fn test_pkcs8_layout() {
        let pkcs8 = build_pkcs8_from_seed(&seed_bytes(7));

        assert_eq!(pkcs8.len(), 48);
        assert!(Ed25519KeyPair::from_pkcs8_maybe_unchecked(&pkcs8).is_ok());
    }

    #[test]
    fn test_sign_sets_kid_header() {
        let keypair = TestKeypair::new(1, "key-1");

        let token = keypair.sign(&json!({ "sub": "alice" }));
        let header = jsonwebtoken::decode_header(&token).unwrap();

        assert_eq!(header.kid.as_deref(), Some("key-1"));
        assert_eq!(header.alg, Algorithm::EdDSA);

        let no_kid = keypair.sign_without_kid(&json!({ "sub": "alice" }));
        assert!(jsonwebtoken::decode_header(&no_kid).unwrap().kid.is_none());
    }

    #[test]
    fn test_jwks_json_lists_keys() {
        let a = TestKeypair::new(1, "a");
        let b = TestKeypair::new(2, "b");

        let jwks = jwks_json(&[&a, &b]);

        assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
        assert_eq!(jwks["keys"][1]["kid"], "b");
    }
}
