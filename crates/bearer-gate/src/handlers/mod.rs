//! HTTP request handlers for the demo service.

pub mod admin;
pub mod health;
pub mod me;

pub use admin::get_admin;
pub use health::health_check;
pub use me::get_me;
