//! In-process fake of the fraud-detection API used by the integration tests.

#![allow(dead_code)]

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use jobcheck_client::{
    AnalysisWorkflow, ApiClient, ApiClientConfig, MemorySessionStore, SessionManager, SessionStore,
    WorkflowConfig,
};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const PASSWORD: &str = "correct-horse";

/// One request as seen by the fake server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub client_header: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct FakeState {
    requests: Mutex<Vec<Recorded>>,
    predict_delay_ms: AtomicUsize,
    history_delay_ms: AtomicUsize,
    failing_gets: AtomicUsize,
}

impl FakeState {
    fn record(&self, req: &HttpRequest, body: Option<Value>) {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            method: req.method().to_string(),
            path: req.path().to_string(),
            query: req.query_string().to_string(),
            authorization: header("authorization"),
            content_type: header("content-type"),
            request_id: header("x-request-id"),
            client_header: header("x-client"),
            body,
        });
    }
}

/// Running fake server
pub struct FakeApi {
    pub url: Url,
    pub state: Arc<FakeState>,
    handle: ServerHandle,
}

impl FakeApi {
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn set_predict_delay(&self, delay: Duration) {
        self.state
            .predict_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn set_history_delay(&self, delay: Duration) {
        self.state
            .history_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Make the next `count` GET requests to `/api/stats` answer 503
    pub fn fail_next_gets(&self, count: usize) {
        self.state.failing_gets.store(count, Ordering::SeqCst);
    }

    pub fn api_client(&self) -> ApiClient {
        let config = ApiClientConfig {
            timeout_seconds: 5,
            connect_timeout_seconds: 2,
            ..ApiClientConfig::default()
        };
        ApiClient::new(self.url.clone(), config, None).unwrap()
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session_with_store(Arc::new(MemorySessionStore::new()))
    }

    pub fn session_with_store(&self, store: Arc<dyn SessionStore>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(self.api_client(), store))
    }

    pub fn workflow(&self, session: Arc<SessionManager>) -> AnalysisWorkflow {
        AnalysisWorkflow::new(session, fast_workflow_config())
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

/// Short timings so scans finish quickly in tests
pub fn fast_workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        scan_interval: Duration::from_millis(15),
        max_increment: 15.0,
        ceiling: 95.0,
        verdict_pause: Duration::from_millis(50),
    }
}

fn bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn user_json(username: &str) -> Value {
    let role = if username == "admin" { "admin" } else { "user" };
    json!({
        "id": if username == "admin" { 1 } else { 7 },
        "username": username,
        "email": format!("{username}@example.com"),
        "role": role,
        "created_at": "2026-01-01T00:00:00",
    })
}

fn token_response(username: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "access_token": format!("token-{username}"),
        "token_type": "bearer",
        "user": user_json(username),
    }))
}

/// Username behind a token issued by this server
fn token_user(req: &HttpRequest) -> Option<String> {
    bearer(req).and_then(|t| t.strip_prefix("token-").map(str::to_string))
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({"detail": "Not authenticated"}))
}

async fn login(state: web::Data<FakeState>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req, Some(body.0.clone()));
    let username = body["username"].as_str().unwrap_or_default();
    if body["password"] == PASSWORD {
        token_response(username)
    } else {
        HttpResponse::Unauthorized().json(json!({"detail": "Invalid username or password"}))
    }
}

async fn register(state: web::Data<FakeState>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req, Some(body.0.clone()));
    match body["username"].as_str().unwrap_or_default() {
        "taken" => HttpResponse::BadRequest().json(json!({"detail": "Username already registered"})),
        "nodetail" => HttpResponse::BadRequest().json(json!({})),
        username => token_response(username),
    }
}

async fn me(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    match token_user(&req) {
        Some(username) => HttpResponse::Ok().json(user_json(&username)),
        None => unauthorized(),
    }
}

async fn predict(state: web::Data<FakeState>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req, Some(body.0.clone()));
    let delay = state.predict_delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let text = body["job_text"].as_str().unwrap_or_default();
    if text.contains("FAIL") {
        return HttpResponse::ServiceUnavailable()
            .json(json!({"detail": "Model not available. Please train the model first."}));
    }
    let prediction = if text.contains("EARN") { "Fake" } else { "Real" };
    HttpResponse::Ok().json(json!({
        "prediction_id": 42,
        "prediction": prediction,
        "confidence": 88.0,
        "analyzed_at": "2026-01-01T00:00:00Z",
    }))
}

async fn my_predictions(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    let delay = state.history_delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if token_user(&req).is_none() {
        return unauthorized();
    }
    HttpResponse::Ok().json(json!({
        "predictions": [
            {"id": 42, "job_text": "EARN $5000 WEEKLY...", "prediction": "Fake", "confidence": 88.0, "created_at": "2026-01-01T00:00:00"},
            {"id": 41, "job_text": "Senior Software Engineer", "prediction": "Real", "confidence": 93.5, "created_at": "2025-12-31T09:30:00"}
        ]
    }))
}

async fn flag(state: web::Data<FakeState>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req, Some(body.0.clone()));
    if token_user(&req).is_none() {
        return unauthorized();
    }
    if body["prediction_id"] == 404 {
        return HttpResponse::NotFound().json(json!({"detail": "Prediction not found"}));
    }
    HttpResponse::Ok().json(json!({
        "id": 1,
        "prediction_id": body["prediction_id"],
        "reason": body["reason"],
        "flagged_at": "2026-01-01T00:01:00",
    }))
}

async fn stats(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    let remaining = state.failing_gets.load(Ordering::SeqCst);
    if remaining > 0 {
        state.failing_gets.store(remaining - 1, Ordering::SeqCst);
        return HttpResponse::ServiceUnavailable().finish();
    }
    HttpResponse::Ok().json(json!({
        "total_predictions": 10,
        "total_fake": 4,
        "total_real": 6,
        "fake_percentage": 40.0,
        "total_flagged": 1,
        "daily_trend": [{"date": "2026-01-01", "total": 10, "fake": 4, "real": 6}],
        "model_info": {"model_name": "LogisticRegression"},
    }))
}

async fn predictions(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    HttpResponse::Ok().json(json!({
        "predictions": [
            {"id": 42, "job_text": "EARN $5000 WEEKLY...", "prediction": "Fake", "confidence": 88.0,
             "created_at": "2026-01-01T00:00:00", "is_flagged": true, "flag_reason": "Flagged by user review"}
        ],
        "total": 1,
    }))
}

async fn flagged(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    HttpResponse::Ok().json(json!({
        "flagged_posts": [
            {"id": 1, "prediction_id": 42, "job_text": "EARN $5000 WEEKLY...", "prediction": "Fake",
             "confidence": 88.0, "reason": "Flagged by user review", "flagged_by": "ana",
             "flagged_at": "2026-01-01T00:01:00"}
        ],
        "total": 1,
    }))
}

async fn retrain(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    state.record(&req, None);
    match token_user(&req).as_deref() {
        Some("admin") => HttpResponse::Ok().json(json!({
            "message": "Model retrained successfully",
            "model_name": "LogisticRegression",
            "version": "v2",
            "accuracy": 0.97,
            "f1_score": 0.91,
        })),
        Some(_) => HttpResponse::Forbidden().json(json!({"detail": "Admin access required"})),
        None => unauthorized(),
    }
}

/// Start the fake API on an ephemeral port
pub async fn start() -> FakeApi {
    let state = Arc::new(FakeState::default());
    let data = web::Data::from(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/auth/login", web::post().to(login))
            .route("/auth/register", web::post().to(register))
            .route("/auth/me", web::get().to(me))
            .route("/api/predict", web::post().to(predict))
            .route("/api/my-predictions", web::get().to(my_predictions))
            .route("/api/flag", web::post().to(flag))
            .route("/api/stats", web::get().to(stats))
            .route("/api/predictions", web::get().to(predictions))
            .route("/api/flagged", web::get().to(flagged))
            .route("/api/retrain", web::post().to(retrain))
    })
    .workers(2)
    .listen(listener)
    .unwrap()
    .run();

    let handle = server.handle();
    actix_web::rt::spawn(server);

    FakeApi {
        url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
        state,
        handle,
    }
}
