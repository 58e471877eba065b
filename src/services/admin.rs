//! Administrative dashboard calls.

use crate::models::{FlaggedPage, Page, PredictionsPage, RetrainResponse, StatsResponse};
use crate::services::api_client::{ApiClient, RequestFailure, RequestOptions};
use crate::services::session::SessionManager;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

pub const STATS_PATH: &str = "/api/stats";
pub const PREDICTIONS_PATH: &str = "/api/predictions";
pub const FLAGGED_PATH: &str = "/api/flagged";
pub const RETRAIN_PATH: &str = "/api/retrain";

/// Errors from administrative calls
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Sign in to use the dashboard")]
    NotAuthenticated,

    #[error("Administrator role required")]
    Forbidden,

    #[error(transparent)]
    Request(#[from] RequestFailure),
}

impl AdminError {
    pub fn user_message(&self) -> String {
        match self {
            AdminError::Request(failure) => failure.user_message(),
            other => other.to_string(),
        }
    }
}

/// Dashboard client sharing the session of the rest of the application
pub struct AdminClient {
    session: Arc<SessionManager>,
}

impl AdminClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Aggregate prediction statistics
    pub async fn stats(&self) -> Result<StatsResponse, AdminError> {
        self.get(STATS_PATH).await
    }

    /// Paginated prediction log
    pub async fn predictions(&self, page: Page) -> Result<PredictionsPage, AdminError> {
        self.get(&format!("{PREDICTIONS_PATH}?{}", page.query())).await
    }

    /// Paginated list of flagged postings
    pub async fn flagged(&self, page: Page) -> Result<FlaggedPage, AdminError> {
        self.get(&format!("{FLAGGED_PATH}?{}", page.query())).await
    }

    /// Retrain the model. Admin only; may take minutes server-side.
    pub async fn retrain(&self) -> Result<RetrainResponse, AdminError> {
        self.require_session()?;
        if !self.session.is_admin() {
            return Err(AdminError::Forbidden);
        }

        let response = self
            .session
            .authorized_fetch(RETRAIN_PATH, RequestOptions::post_empty())
            .await?;
        let retrained: RetrainResponse = ApiClient::json(response).await?;
        info!(
            model = %retrained.model_name,
            version = %retrained.version,
            accuracy = retrained.accuracy,
            f1_score = retrained.f1_score,
            "Model retrained"
        );
        Ok(retrained)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdminError> {
        self.require_session()?;
        let response = self.session.authorized_fetch(path, RequestOptions::get()).await?;
        Ok(ApiClient::json(response).await?)
    }

    fn require_session(&self) -> Result<(), AdminError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(AdminError::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::ApiClientConfig;
    use crate::services::session_store::MemorySessionStore;
    use url::Url;

    fn admin_client() -> AdminClient {
        let api = ApiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            ApiClientConfig::default(),
            None,
        )
        .unwrap();
        AdminClient::new(Arc::new(SessionManager::new(api, Arc::new(MemorySessionStore::new()))))
    }

    #[tokio::test]
    async fn test_requires_session() {
        let admin = admin_client();
        assert!(matches!(admin.stats().await, Err(AdminError::NotAuthenticated)));
        assert!(matches!(admin.predictions(Page::default()).await, Err(AdminError::NotAuthenticated)));
        assert!(matches!(admin.retrain().await, Err(AdminError::NotAuthenticated)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(AdminError::Forbidden.user_message(), "Administrator role required");
    }
}
