//! Environment configuration for the analysis workflow.

use crate::services::workflow::{MAX_SCAN_CEILING, WorkflowConfig};
use std::env;
use std::time::Duration;

impl WorkflowConfig {
    /// Load workflow timing from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let scan_interval = env::var("JOBCHECK_SCAN_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.scan_interval);

        let max_increment = env::var("JOBCHECK_SCAN_MAX_INCREMENT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(defaults.max_increment);

        let ceiling = env::var("JOBCHECK_SCAN_CEILING")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, MAX_SCAN_CEILING))
            .unwrap_or(defaults.ceiling);

        let verdict_pause = env::var("JOBCHECK_VERDICT_PAUSE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.verdict_pause);

        Self {
            scan_interval,
            max_increment,
            ceiling,
            verdict_pause,
        }
    }
}
