//! Observability for the bearer gate.
//!
//! # Components
//!
//! - `metrics` - Counter definitions for authentication outcomes and metadata fetches

pub mod metrics;
