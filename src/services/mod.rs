//! Client-side services.
//!
//! The transport, the session manager and its storage, the analysis
//! workflow, and the administrative dashboard client.

pub mod admin;
pub mod api_client;
pub mod session;
pub mod session_store;
pub mod workflow;

pub use admin::*;
pub use api_client::*;
pub use session::*;
pub use session_store::*;
pub use workflow::*;
