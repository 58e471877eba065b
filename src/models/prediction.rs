//! Prediction, history and flagging models.

use crate::utils::time::{parse_server_timestamp, server_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label the prediction service uses for fraudulent postings.
pub const FRAUDULENT_LABEL: &str = "Fake";

/// Binary classification of one submitted posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Fraudulent,
    Legitimate,
}

impl Verdict {
    /// Map a server prediction label onto a verdict.
    ///
    /// `"Fake"` is fraudulent; every other label is legitimate. All call
    /// sites go through here.
    pub fn from_label(label: &str) -> Self {
        if label == FRAUDULENT_LABEL {
            Verdict::Fraudulent
        } else {
            Verdict::Legitimate
        }
    }

    pub fn is_fraudulent(&self) -> bool {
        matches!(self, Verdict::Fraudulent)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Fraudulent => write!(f, "FRAUDULENT"),
            Verdict::Legitimate => write!(f, "LEGITIMATE"),
        }
    }
}

/// Clamp a percentage to `[0, 100]`, mapping NaN to 0.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Request body for `/api/predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub job_text: String,
}

/// Raw response body of `/api/predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction_id: i64,
    pub prediction: String,
    pub confidence: f64,
    #[serde(with = "server_timestamp")]
    pub analyzed_at: DateTime<Utc>,
}

/// Outcome of one analysis, immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub prediction_id: i64,
    pub verdict: Verdict,
    pub confidence: f64,
    pub analyzed_at: DateTime<Utc>,
}

impl From<PredictResponse> for AnalysisResult {
    fn from(resp: PredictResponse) -> Self {
        Self {
            prediction_id: resp.prediction_id,
            verdict: Verdict::from_label(&resp.prediction),
            confidence: clamp_percentage(resp.confidence),
            analyzed_at: resp.analyzed_at,
        }
    }
}

/// One entry of a prediction listing (`/api/my-predictions`, `/api/predictions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLog {
    pub id: i64,
    pub job_text: String,
    pub prediction: String,
    pub confidence: f64,
    pub created_at: String,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub flag_reason: Option<String>,
}

impl PredictionLog {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_label(&self.prediction)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_server_timestamp(&self.created_at)
    }
}

/// Response body of `/api/my-predictions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionHistory {
    #[serde(default)]
    pub predictions: Vec<PredictionLog>,
}

/// Request body for `/api/flag`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRequest {
    pub prediction_id: i64,
    pub reason: String,
}

/// Acknowledgement returned by `/api/flag`. The body is not fixed by the
/// API contract, so it is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagAck(pub serde_json::Value);
