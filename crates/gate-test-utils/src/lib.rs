//! # Gate Test Utilities
//!
//! Shared test utilities for the bearer gate.
//!
//! This crate provides:
//! - Deterministic Ed25519 key fixtures (fixed keys for reproducible tests)
//! - Test claim builders (`TestTokenBuilder`)
//! - A wiremock-backed OpenID Connect provider (`MockIdentityProvider`)
//! - Server test harness (`TestGateServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let idp = MockIdentityProvider::start(&[&keypair]).await;
//!     let server = TestGateServer::with_idp(&idp).await?;
//!
//!     let token = TestTokenBuilder::new()
//!         .subject("alice")
//!         .roles(&["admin"])
//!         .sign_with(&keypair);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use token_builders::*;
