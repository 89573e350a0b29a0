//! JWT bearer token validator.
//!
//! Verifies compact JWS tokens against the signing keys in the merged
//! validation parameters, then checks issuer, audience and the time claims.
//!
//! # Key selection
//!
//! - A token with a `kid` considers keys with that `kid`; when there are none
//!   it falls back to keys published without a `kid`
//! - No usable key at all is [`TokenValidationError::SigningKeyNotFound`],
//!   the key-rollover signal
//! - A token without a `kid` tries every key that supports its `alg`
//! - Keys are never used for an algorithm outside their own family
//!
//! # Security
//!
//! - Token size is bounded before any parsing (see `common::jwt`)
//! - `alg: none` is never readable
//! - `exp` is required; `nbf` is enforced when present; `iat` may not be
//!   further in the future than the clock skew
//! - With issuer validation on and no accepted issuers, every token fails

use crate::auth::identity::Identity;
use crate::auth::keys::SigningKey;
use crate::auth::params::ValidationParameters;
use crate::auth::validator::{TokenValidationError, TokenValidator};
use common::jwt::{peek_header, validate_iat, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Validator for signed JWTs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtTokenValidator;

impl JwtTokenValidator {
    pub const NAME: &'static str = "jwt";

    pub fn new() -> Self {
        Self
    }
}

impl TokenValidator for JwtTokenValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_read(&self, token: &str) -> bool {
        peek_header(token).is_ok()
    }

    fn validate(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<Identity, TokenValidationError> {
        let header = peek_header(token).map_err(|e| match e {
            JwtValidationError::MissingAlgorithm => TokenValidationError::UnsupportedAlgorithm,
            _ => TokenValidationError::Malformed,
        })?;

        let alg = Algorithm::from_str(&header.alg).map_err(|_| {
            tracing::debug!(target: "gate.auth.jwt", alg = %header.alg, "Unknown JWS algorithm");
            TokenValidationError::UnsupportedAlgorithm
        })?;

        let candidates = candidate_keys(&params.signing_keys, header.kid.as_deref(), alg)?;

        if params.validate_issuer && params.valid_issuers.is_empty() {
            tracing::debug!(
                target: "gate.auth.jwt",
                "Issuer validation enabled but no issuers are accepted"
            );
            return Err(TokenValidationError::InvalidIssuer);
        }

        let validation = build_validation(alg, params);

        let mut last_error = TokenValidationError::InvalidSignature;
        for key in candidates {
            match decode::<Map<String, Value>>(token, key.decoding_key(), &validation) {
                Ok(data) => {
                    check_iat(&data.claims, params)?;
                    tracing::trace!(
                        target: "gate.auth.jwt",
                        kid = ?key.kid(),
                        "Token signature and claims verified"
                    );
                    return Ok(Identity::from_json_claims(
                        &data.claims,
                        &params.role_claim_types,
                    ));
                }
                Err(e) => match map_decode_error(e.kind()) {
                    // Another key with the same kid/alg may still verify it
                    TokenValidationError::InvalidSignature => {
                        last_error = TokenValidationError::InvalidSignature;
                    }
                    other => return Err(other),
                },
            }
        }

        Err(last_error)
    }
}

fn candidate_keys<'a>(
    keys: &'a [SigningKey],
    kid: Option<&str>,
    alg: Algorithm,
) -> Result<Vec<&'a SigningKey>, TokenValidationError> {
    let by_kid: Vec<&SigningKey> = match kid {
        Some(kid) => keys.iter().filter(|k| k.kid() == Some(kid)).collect(),
        None => keys.iter().collect(),
    };

    if by_kid.is_empty() {
        // Keys published without a kid may still have signed the token
        let unnamed: Vec<&SigningKey> = keys
            .iter()
            .filter(|k| k.kid().is_none() && k.supports(alg))
            .collect();
        if !unnamed.is_empty() {
            return Ok(unnamed);
        }

        tracing::debug!(
            target: "gate.auth.jwt",
            kid = ?kid,
            known_keys = keys.len(),
            "No signing key matches token"
        );
        return Err(TokenValidationError::SigningKeyNotFound {
            kid: kid.map(ToString::to_string),
        });
    }

    let compatible: Vec<&SigningKey> = by_kid.into_iter().filter(|k| k.supports(alg)).collect();
    if compatible.is_empty() {
        tracing::debug!(target: "gate.auth.jwt", alg = ?alg, "No matching key supports algorithm");
        return Err(TokenValidationError::UnsupportedAlgorithm);
    }

    Ok(compatible)
}

fn build_validation(alg: Algorithm, params: &ValidationParameters) -> Validation {
    let mut validation = Validation::new(alg);
    validation.leeway = params.clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp"]);

    if params.validate_issuer {
        validation.set_issuer(&params.valid_issuers);
    }

    if params.valid_audiences.is_empty() {
        validation.validate_aud = false;
    } else {
        validation.set_audience(&params.valid_audiences);
    }

    validation
}

fn check_iat(
    claims: &Map<String, Value>,
    params: &ValidationParameters,
) -> Result<(), TokenValidationError> {
    let Some(iat) = claims.get("iat") else {
        return Ok(());
    };

    #[allow(clippy::cast_possible_truncation)]
    let iat = iat
        .as_i64()
        .or_else(|| iat.as_f64().map(|f| f as i64))
        .ok_or_else(|| TokenValidationError::Rejected("iat is not numeric".to_string()))?;

    validate_iat(iat, params.clock_skew).map_err(|_| TokenValidationError::IssuedInFuture)
}

fn map_decode_error(kind: &ErrorKind) -> TokenValidationError {
    match kind {
        ErrorKind::ExpiredSignature => TokenValidationError::Expired,
        ErrorKind::ImmatureSignature => TokenValidationError::NotYetValid,
        ErrorKind::InvalidIssuer => TokenValidationError::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenValidationError::InvalidAudience,
        ErrorKind::InvalidSignature => TokenValidationError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
            TokenValidationError::UnsupportedAlgorithm
        }
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "iss" => TokenValidationError::InvalidIssuer,
            "aud" => TokenValidationError::InvalidAudience,
            other => TokenValidationError::Rejected(format!("missing required claim {other}")),
        },
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenValidationError::Malformed,
        other => TokenValidationError::Rejected(format!("{other:?}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::keys::parse_jwks;
    use gate_test_utils::{jwks_json, TestKeypair, TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER};
    use serde_json::json;
    use std::time::Duration;

    fn params_for(keypairs: &[&TestKeypair]) -> ValidationParameters {
        ValidationParameters {
            valid_issuers: vec![TEST_ISSUER.to_string()],
            valid_audiences: vec![TEST_AUDIENCE.to_string()],
            signing_keys: parse_jwks(jwks_json(keypairs).to_string().as_bytes()).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_can_read_compact_jws_only() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().sign_with(&keypair);
        let validator = JwtTokenValidator::new();

        assert!(validator.can_read(&token));
        assert!(!validator.can_read("opaque-reference-token"));
        assert!(!validator.can_read(""));
        assert!(!validator.can_read(&"a".repeat(10_000)));
    }

    #[test]
    fn test_valid_token_yields_identity_with_claims() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .subject("alice")
            .roles(&["user", "admin"])
            .sign_with(&keypair);

        let identity = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap();

        assert!(identity.is_authenticated());
        assert_eq!(identity.name(), Some("alice"));
        assert_eq!(identity.find_first("iss"), Some(TEST_ISSUER));
        assert!(identity.is_in_role("admin"));
    }

    #[test]
    fn test_unknown_kid_is_key_not_found() {
        let signer = TestKeypair::new(1, "rotated-in");
        let known = TestKeypair::new(2, "old-key");
        let token = TestTokenBuilder::new().sign_with(&signer);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&known]))
            .unwrap_err();

        assert_eq!(
            err,
            TokenValidationError::SigningKeyNotFound {
                kid: Some("rotated-in".to_string())
            }
        );
        assert!(err.is_key_not_found());
    }

    #[test]
    fn test_no_keys_is_key_not_found() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[]))
            .unwrap_err();

        assert!(err.is_key_not_found());
    }

    #[test]
    fn test_token_without_kid_tries_all_keys() {
        let other = TestKeypair::new(2, "other");
        let signer = TestKeypair::new(1, "signer");
        let claims = TestTokenBuilder::new().subject("bob").build();
        let token = signer.sign_without_kid(&claims);

        let identity = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&other, &signer]))
            .unwrap();

        assert_eq!(identity.name(), Some("bob"));
    }

    #[test]
    fn test_token_without_kid_and_wrong_keys_is_invalid_signature() {
        let signer = TestKeypair::new(1, "signer");
        let other = TestKeypair::new(2, "other");
        let token = signer.sign_without_kid(&TestTokenBuilder::new().build());

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&other]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidSignature);
        assert!(!err.is_key_not_found());
    }

    fn params_with_unnamed_key(keypair: &TestKeypair) -> ValidationParameters {
        let mut jwk = keypair.jwk_json();
        jwk.as_object_mut().unwrap().remove("kid");
        ValidationParameters {
            signing_keys: parse_jwks(json!({ "keys": [jwk] }).to_string().as_bytes()).unwrap(),
            ..params_for(&[])
        }
    }

    #[test]
    fn test_kid_falls_back_to_keys_without_kid() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().subject("carol").sign_with(&keypair);

        let identity = JwtTokenValidator::new()
            .validate(&token, &params_with_unnamed_key(&keypair))
            .unwrap();

        assert_eq!(identity.name(), Some("carol"));
    }

    #[test]
    fn test_kid_fallback_with_wrong_key_is_invalid_signature() {
        let signer = TestKeypair::new(1, "key-1");
        let unnamed = TestKeypair::new(2, "unused");
        let token = TestTokenBuilder::new().sign_with(&signer);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_with_unnamed_key(&unnamed))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidSignature);
        assert!(!err.is_key_not_found());
    }

    #[test]
    fn test_forged_signature_with_known_kid() {
        let real = TestKeypair::new(1, "key-1");
        let forger = TestKeypair::new(9, "key-1");
        let token = TestTokenBuilder::new().sign_with(&forger);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&real]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidSignature);
    }

    #[test]
    fn test_expired_token() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .expires_in(-3600)
            .issued_at_offset(-7200)
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::Expired);
        assert!(!err.is_key_not_found());
    }

    #[test]
    fn test_expiry_within_clock_skew_is_accepted() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().expires_in(-60).sign_with(&keypair);

        let result = JwtTokenValidator::new().validate(&token, &params_for(&[&keypair]));

        assert!(result.is_ok());
    }

    #[test]
    fn test_not_yet_valid_token() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .not_before_offset(3600)
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::NotYetValid);
    }

    #[test]
    fn test_iat_too_far_in_future() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .issued_at_offset(3600)
            .expires_in(7200)
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::IssuedInFuture);
    }

    #[test]
    fn test_missing_exp_is_rejected() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .without_claim("exp")
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert!(matches!(err, TokenValidationError::Rejected(_)));
    }

    #[test]
    fn test_wrong_issuer() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .issuer("https://evil.example")
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidIssuer);
    }

    #[test]
    fn test_issuer_check_fails_closed_without_issuers() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().sign_with(&keypair);
        let params = ValidationParameters {
            valid_issuers: Vec::new(),
            ..params_for(&[&keypair])
        };

        let err = JwtTokenValidator::new()
            .validate(&token, &params)
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidIssuer);
    }

    #[test]
    fn test_issuer_check_can_be_disabled() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .issuer("https://anyone.example")
            .sign_with(&keypair);
        let params = ValidationParameters {
            valid_issuers: Vec::new(),
            validate_issuer: false,
            ..params_for(&[&keypair])
        };

        assert!(JwtTokenValidator::new().validate(&token, &params).is_ok());
    }

    #[test]
    fn test_wrong_audience() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .audience("someone-else")
            .sign_with(&keypair);

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::InvalidAudience);
    }

    #[test]
    fn test_empty_audience_list_skips_audience_check() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new()
            .audience("someone-else")
            .sign_with(&keypair);
        let params = ValidationParameters {
            valid_audiences: Vec::new(),
            ..params_for(&[&keypair])
        };

        assert!(JwtTokenValidator::new().validate(&token, &params).is_ok());
    }

    #[test]
    fn test_algorithm_outside_key_family() {
        let keypair = TestKeypair::new(1, "key-1");
        // Header claims HS256 for an Ed25519 key
        let token = format!(
            "{}.{}.sig",
            base64_json(&json!({ "alg": "HS256", "kid": "key-1" })),
            base64_json(&TestTokenBuilder::new().build())
        );

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::UnsupportedAlgorithm);
    }

    #[test]
    fn test_unknown_algorithm_name() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = format!(
            "{}.{}.sig",
            base64_json(&json!({ "alg": "XX999", "kid": "key-1" })),
            base64_json(&TestTokenBuilder::new().build())
        );

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert_eq!(err, TokenValidationError::UnsupportedAlgorithm);
    }

    #[test]
    fn test_garbage_payload_is_malformed() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = format!(
            "{}.!!!not-base64!!!.sig",
            base64_json(&json!({ "alg": "EdDSA", "kid": "key-1" }))
        );

        let err = JwtTokenValidator::new()
            .validate(&token, &params_for(&[&keypair]))
            .unwrap_err();

        assert!(matches!(
            err,
            TokenValidationError::Malformed | TokenValidationError::InvalidSignature
        ));
    }

    #[test]
    fn test_clock_skew_is_honored() {
        let keypair = TestKeypair::new(1, "key-1");
        let token = TestTokenBuilder::new().expires_in(-60).sign_with(&keypair);
        let params = ValidationParameters {
            clock_skew: Duration::from_secs(10),
            ..params_for(&[&keypair])
        };

        let err = JwtTokenValidator::new()
            .validate(&token, &params)
            .unwrap_err();

        assert_eq!(err, TokenValidationError::Expired);
    }

    fn base64_json(value: &Value) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        URL_SAFE_NO_PAD.encode(value.to_string())
    }
}
