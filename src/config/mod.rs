//! Configuration structures and loading utilities.
//!
//! Everything is read from environment variables with defaults suitable for
//! a local development API on port 8000.

pub mod api_client;
pub mod workflow;

use crate::services::api_client::ApiClientConfig;
use crate::services::workflow::WorkflowConfig;
use crate::telemetry::LogFormat;
use std::env;
use std::path::PathBuf;
use url::Url;

/// Default base URL of the fraud-detection API
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Top-level client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub session_file: PathBuf,
    pub http: ApiClientConfig,
    pub workflow: WorkflowConfig,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env::var("JOBCHECK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)?;

        let session_file = env::var("JOBCHECK_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());

        let log_format = env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            api_url,
            session_file,
            http: ApiClientConfig::from_env(),
            workflow: WorkflowConfig::from_env(),
            log_format,
        })
    }
}

/// Validate an API base URL
pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl(format!("{raw}: unsupported scheme {other}"))),
    }
}

/// `<data dir>/jobcheck/session.json`, or the working directory when the
/// platform has no data dir
pub fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobcheck")
        .join("session.json")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API URL {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to synchronize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "JOBCHECK_API_URL",
        "JOBCHECK_SESSION_FILE",
        "JOBCHECK_HTTP_TIMEOUT",
        "JOBCHECK_HTTP_RETRY_MAX_ATTEMPTS",
        "JOBCHECK_HTTP_RETRY_ON_STATUS",
        "JOBCHECK_SCAN_INTERVAL_MS",
        "JOBCHECK_SCAN_CEILING",
        "JOBCHECK_VERDICT_PAUSE_MS",
        "LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_client_config_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
        assert!(config.session_file.ends_with("jobcheck/session.json"));
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.workflow.scan_interval, Duration::from_millis(120));
        assert_eq!(config.workflow.ceiling, 95.0);
        assert_eq!(config.workflow.verdict_pause, Duration::from_millis(600));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_client_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        unsafe {
            env::set_var("JOBCHECK_API_URL", "https://jobs.example.com/api-root");
            env::set_var("JOBCHECK_SESSION_FILE", "/tmp/jc.json");
            env::set_var("JOBCHECK_HTTP_TIMEOUT", "7");
            env::set_var("JOBCHECK_HTTP_RETRY_MAX_ATTEMPTS", "5");
            env::set_var("JOBCHECK_HTTP_RETRY_ON_STATUS", "502, 503,bogus");
            env::set_var("JOBCHECK_SCAN_INTERVAL_MS", "50");
            env::set_var("JOBCHECK_VERDICT_PAUSE_MS", "0");
            env::set_var("LOG_FORMAT", "json");
        }

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_url.host_str(), Some("jobs.example.com"));
        assert_eq!(config.session_file, PathBuf::from("/tmp/jc.json"));
        assert_eq!(config.http.timeout_seconds, 7);
        assert_eq!(config.http.retry.max_attempts, 5);
        assert_eq!(config.http.retry.retry_on_status, vec![502, 503]);
        assert_eq!(config.workflow.scan_interval, Duration::from_millis(50));
        assert_eq!(config.workflow.verdict_pause, Duration::ZERO);
        assert_eq!(config.log_format, LogFormat::Json);

        clear_env();
    }

    #[test]
    fn test_scan_ceiling_stays_below_completion() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        unsafe {
            env::set_var("JOBCHECK_SCAN_CEILING", "100");
        }
        let config = WorkflowConfig::from_env();
        assert!(config.ceiling < 100.0);

        clear_env();
    }

    #[test]
    fn test_invalid_api_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        unsafe {
            env::set_var("JOBCHECK_API_URL", "not a url");
        }
        assert!(matches!(ClientConfig::from_env(), Err(ConfigError::InvalidUrl(_))));

        clear_env();
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("ftp://example.com").is_err());
        assert!(parse_api_url(" http://127.0.0.1:9000 ").is_ok());
    }
}
