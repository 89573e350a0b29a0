//! Signing keys used to verify token signatures.
//!
//! Keys arrive as JSON Web Keys, either from a static JWKS document in
//! configuration or from the issuer's `jwks_uri`. Each JWK is converted into
//! a verification key once, when it is loaded, together with the list of JWS
//! algorithms it may verify.
//!
//! # Security
//!
//! - A key only verifies algorithms of its own family (no RSA key used for HMAC)
//! - When the JWK pins `alg`, only that algorithm is accepted
//! - Unconvertible keys are skipped with a warning instead of failing the set

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid JWKS document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported key: {0}")]
    Unsupported(String),
}

/// A verification key plus the algorithms it may verify.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    algorithms: Vec<Algorithm>,
    decoding_key: DecodingKey,
    /// Canonical JWK serialization, used for set semantics.
    fingerprint: String,
}

impl SigningKey {
    /// Convert a JWK into a verification key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Unsupported` when the key type, curve, or pinned
    /// algorithm cannot be used for signature verification.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        let family = family_algorithms(&jwk.algorithm);
        if family.is_empty() {
            return Err(KeyError::Unsupported(
                "key type or curve cannot verify JWS signatures".to_string(),
            ));
        }

        let algorithms = match jwk.common.key_algorithm {
            Some(pinned) => {
                let alg = jws_algorithm(pinned).ok_or_else(|| {
                    KeyError::Unsupported(format!("algorithm {pinned:?} is not a JWS algorithm"))
                })?;
                if !family.contains(&alg) {
                    return Err(KeyError::Unsupported(format!(
                        "algorithm {alg:?} does not match key type"
                    )));
                }
                vec![alg]
            }
            None => family,
        };

        let decoding_key =
            DecodingKey::from_jwk(jwk).map_err(|e| KeyError::Unsupported(e.to_string()))?;

        let fingerprint =
            serde_json::to_string(jwk).map_err(|e| KeyError::Unsupported(e.to_string()))?;

        Ok(Self {
            kid: jwk.common.key_id.clone(),
            algorithms,
            decoding_key,
            fingerprint,
        })
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn supports(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Same key material and parameters.
    pub fn same_key(&self, other: &SigningKey) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RawJwks {
    keys: Vec<serde_json::Value>,
}

/// Parse a JWKS document (`{"keys": [...]}`) into verification keys.
///
/// Individual keys that cannot be parsed or converted are skipped and logged;
/// only a document that is not a JWKS at all is an error.
///
/// # Errors
///
/// Returns `KeyError::InvalidDocument` if the document is not JSON or has no
/// `keys` array.
pub fn parse_jwks(document: &[u8]) -> Result<Vec<SigningKey>, KeyError> {
    let raw: RawJwks =
        serde_json::from_slice(document).map_err(|e| KeyError::InvalidDocument(e.to_string()))?;

    Ok(keys_from_values(raw.keys))
}

pub(crate) fn keys_from_values(values: Vec<serde_json::Value>) -> Vec<SigningKey> {
    let mut keys: Vec<SigningKey> = Vec::with_capacity(values.len());
    for value in values {
        let key = serde_json::from_value::<Jwk>(value)
            .map_err(|e| KeyError::Unsupported(e.to_string()))
            .and_then(|jwk| SigningKey::from_jwk(&jwk));

        match key {
            Ok(key) => {
                if !keys.iter().any(|k| k.same_key(&key)) {
                    keys.push(key);
                }
            }
            Err(e) => {
                tracing::warn!(target: "gate.auth.keys", error = %e, "Skipping unusable JWK");
            }
        }
    }
    keys
}

fn family_algorithms(params: &AlgorithmParameters) -> Vec<Algorithm> {
    match params {
        AlgorithmParameters::RSA(_) => RSA_ALGORITHMS.to_vec(),
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => vec![Algorithm::ES256],
            EllipticCurve::P384 => vec![Algorithm::ES384],
            _ => Vec::new(),
        },
        AlgorithmParameters::OctetKeyPair(okp) => match okp.curve {
            EllipticCurve::Ed25519 => vec![Algorithm::EdDSA],
            _ => Vec::new(),
        },
        AlgorithmParameters::OctetKey(_) => HMAC_ALGORITHMS.to_vec(),
    }
}

fn jws_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // Key-encryption algorithms
        _ => None,
    }
}
