//! Administrative dashboard models.

use super::prediction::PredictionLog;
use serde::{Deserialize, Serialize};

/// Per-day counts inside the statistics response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: String,
    pub total: u64,
    pub fake: u64,
    pub real: u64,
}

/// Response body of `/api/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_predictions: u64,
    pub total_fake: u64,
    pub total_real: u64,
    pub fake_percentage: f64,
    pub total_flagged: u64,
    #[serde(default, alias = "daily_stats")]
    pub daily_trend: Vec<DailyStat>,
    #[serde(default)]
    pub model_info: Option<serde_json::Value>,
}

/// Response body of `/api/predictions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionsPage {
    #[serde(default)]
    pub predictions: Vec<PredictionLog>,
    #[serde(default)]
    pub total: u64,
}

/// One flagged posting in `/api/flagged`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedPost {
    pub id: i64,
    pub prediction_id: i64,
    #[serde(default)]
    pub job_text: String,
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub flagged_by: Option<String>,
    pub flagged_at: String,
}

/// Response body of `/api/flagged`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlaggedPage {
    #[serde(default)]
    pub flagged_posts: Vec<FlaggedPost>,
    #[serde(default)]
    pub total: u64,
}

/// Response body of `/api/retrain`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub message: String,
    pub model_name: String,
    pub version: String,
    pub accuracy: f64,
    pub f1_score: f64,
}

/// Pagination parameters shared by listing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 50 }
    }
}

impl Page {
    pub fn query(&self) -> String {
        format!("skip={}&limit={}", self.skip, self.limit)
    }
}
