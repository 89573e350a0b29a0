//! Secret types for protecting bearer tokens from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. The gate holds every
//! bearer token it extracts from an `Authorization` header in a [`SecretString`]
//! so the raw token never reaches a log line or a `Debug` dump.
//!
//! # Compile-Time Safety
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds a token gets safe logging behavior for free. Reading the
//! value requires an explicit `expose_secret()` call at the point of use.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BearerCredential {
//!     scheme: String,
//!     token: SecretString,
//! }
//!
//! let credential = BearerCredential {
//!     scheme: "Bearer".to_string(),
//!     token: SecretString::from("eyJhbGciOiJFZERTQSJ9.e30.c2ln"),
//! };
//!
//! // Safe: the token is redacted
//! println!("{:?}", credential);
//!
//! let raw: &str = credential.token.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("header.payload.signature");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("payload"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token-value");
        assert_eq!(secret.expose_secret(), "token-value");
    }

    #[test]
    fn test_struct_with_token_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct BearerCredential {
            scheme: String,
            token: SecretString,
        }

        let credential = BearerCredential {
            scheme: "Bearer".to_string(),
            token: SecretString::from("very-secret-token"),
        };

        let debug_str = format!("{credential:?}");

        assert!(debug_str.contains("Bearer"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("very-secret-token"));
    }

    #[test]
    fn test_deserialize_keeps_value_hidden() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct StaticKeyConfig {
            kid: String,
            secret: SecretString,
        }

        let json = r#"{"kid": "hmac-1", "secret": "shared-secret-value"}"#;
        let config: StaticKeyConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.secret.expose_secret(), "shared-secret-value");

        let debug = format!("{config:?}");
        assert!(!debug.contains("shared-secret-value"));
        assert!(debug.contains("hmac-1"));
    }
}
