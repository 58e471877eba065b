//! Data models exchanged with the fraud-detection API.
//!
//! Request/response bodies for authentication, prediction and the
//! administrative dashboard.

pub mod admin;
pub mod auth;
pub mod prediction;

pub use admin::*;
pub use auth::*;
pub use prediction::*;
