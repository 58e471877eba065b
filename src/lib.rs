//! JobCheck client - session handling and analysis workflow for the
//! job-posting fraud-detection API
//!
//! The crate covers the client side of the service:
//! - Session management with bearer tokens persisted on this machine
//! - Authorized requests to the API with retries for idempotent calls
//! - The analysis workflow (input, scanning with simulated progress, verdict)
//! - Flagging fraudulent verdicts and reading prediction history
//! - Administrative dashboard calls (statistics, logs, retraining)
//!
//! ## Architecture
//!
//! - `models/` - Request/response bodies and the verdict mapping
//! - `services/` - Transport, session manager, session storage, workflow, admin client
//! - `config/` - Configuration structures and environment loading
//! - `utils/` - Log redaction and timestamp parsing
//! - `telemetry` - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use jobcheck_client::{
//!     AnalysisWorkflow, ApiClient, ClientConfig, FileSessionStore, SessionManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let api = ApiClient::new(config.api_url.clone(), config.http.clone(), None)?;
//!     let session = Arc::new(SessionManager::new(
//!         api,
//!         Arc::new(FileSessionStore::new(&config.session_file)),
//!     ));
//!     session.restore();
//!
//!     let workflow = AnalysisWorkflow::new(session.clone(), config.workflow.clone());
//!     if let Some(result) = workflow.submit("EARN $5000 WEEKLY from home!").await? {
//!         println!("{} ({:.1}%)", result.verdict, result.confidence);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::{ClientConfig, ConfigError};
pub use models::{AnalysisResult, PredictionLog, User, Verdict};
pub use services::{
    AdminClient, AdminError, AnalysisWorkflow, ApiClient, ApiClientConfig, ApiClientMetrics,
    FileSessionStore, MemorySessionStore, RequestFailure, RequestOptions, RestoreOutcome, Session,
    SessionError, SessionManager, SessionStore, StoreError, WorkflowConfig, WorkflowError,
    WorkflowSnapshot, WorkflowState,
};
