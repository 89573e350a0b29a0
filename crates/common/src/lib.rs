//! Common utilities shared by the bearer gate and its test utilities.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, header inspection, clock skew)
pub mod jwt;
