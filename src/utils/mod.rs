//! Utility functions and helper modules.
//!
//! Log redaction and parsing of timestamps sent by the API.

pub mod redact;
pub mod time;

pub use redact::*;
pub use time::parse_server_timestamp;
