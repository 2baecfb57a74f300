//! Dashboard HTTP server.
//!
//! A thin JSON layer over the sequencer and display views. Each browser
//! tab creates a session; the session owns its key, its sweep, and at
//! most one open model dialog.
//!
//! The user's key travels in one request body (`PUT .../key`) and is
//! never echoed back or logged.

mod error;
pub mod session;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{get_model, Catalog, ModelDescriptor};
use crate::display::{table_view, DetailView, TableView};
use crate::interpreter::{ErrorInterpreter, Interpretation};
use crate::probe::ModelProbe;
use crate::provider::ModelProvider;
use crate::sequencer::{Sequencer, SweepRun};
use crate::validator::CredentialValidator;

pub use error::ApiError;
pub use session::{Session, SessionStore};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

// ── State ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub validator: Arc<CredentialValidator>,
    pub probe: Arc<ModelProbe>,
    pub interpreter: Arc<ErrorInterpreter>,
    pub sessions: SessionStore,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        catalog: Catalog,
        provider: Arc<dyn ModelProvider>,
        interpreter: ErrorInterpreter,
    ) -> Self {
        Self {
            catalog,
            validator: Arc::new(CredentialValidator::new(Arc::clone(&provider))),
            probe: Arc::new(ModelProbe::new(provider)),
            interpreter: Arc::new(interpreter),
            sessions: SessionStore::new(),
            started_at: Utc::now(),
        }
    }

    async fn session(&self, id: Uuid) -> Result<Arc<Session>, ApiError> {
        self.sessions
            .get(&id)
            .await
            .ok_or(ApiError::SessionNotFound(id))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/catalog", get(catalog))
        .route("/api/interpret", post(interpret))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/key", put(set_key).delete(clear_key))
        .route("/api/sessions/:id/refresh", post(refresh))
        .route("/api/sessions/:id/models", get(models))
        .route(
            "/api/sessions/:id/dialog",
            put(open_dialog).get(show_dialog).delete(close_dialog),
        )
        .route("/api/sessions/:id/dialog/probe", post(probe_dialog))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Wire Types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub active_sessions: usize,
    pub interpreter_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

/// Body of `PUT /api/sessions/:id/key`. No `Debug`: it holds the raw key.
#[derive(Deserialize)]
pub struct KeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run: SweepRun,
}

#[derive(Debug, Deserialize)]
pub struct DialogRequest {
    pub model_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InterpretRequest {
    pub raw_error: String,
}

// ── Handlers ────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        active_sessions: state.sessions.len().await,
        interpreter_enabled: state.interpreter.is_enabled(),
    })
}

async fn catalog(State(state): State<AppState>) -> Json<&'static [ModelDescriptor]> {
    Json(state.catalog)
}

async fn interpret(
    State(state): State<AppState>,
    Json(req): Json<InterpretRequest>,
) -> Json<Interpretation> {
    Json(state.interpreter.interpret(&req.raw_error).await)
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let sequencer = Sequencer::new(state.catalog, Arc::clone(&state.probe));
    let session = state.sessions.create(sequencer).await;
    (StatusCode::CREATED, Json(SessionCreated { session_id: session.id }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

/// Validate and install a key. A rejected key leaves the session as it was.
async fn set_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let session = state.session(id).await?;
    let key = state.validator.validate(&req.api_key).await?;

    session.close_dialog();
    let run = match session.sequencer.set_key(Some(key)) {
        Some(handle) => handle.run,
        None => session.sequencer.current_run(),
    };
    info!(session_id = %id, run = run.number(), "🔑 Key accepted");
    Ok(Json(RunResponse { run }))
}

async fn clear_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(id).await?;
    session.close_dialog();
    session.sequencer.set_key(None);
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunResponse>, ApiError> {
    let session = state.session(id).await?;
    if session.sequencer.snapshot().is_checking() {
        return Err(ApiError::RefreshUnavailable("a sweep is still running"));
    }
    let handle = session
        .sequencer
        .refresh()
        .ok_or(ApiError::RefreshUnavailable("no API key set"))?;
    Ok(Json(RunResponse { run: handle.run }))
}

async fn models(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TableView>, ApiError> {
    let session = state.session(id).await?;
    let snapshot = session.sequencer.snapshot();
    Ok(Json(table_view(
        state.catalog,
        &snapshot,
        session.sequencer.has_key(),
    )))
}

async fn open_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DialogRequest>,
) -> Result<Json<DetailView>, ApiError> {
    let session = state.session(id).await?;
    let model_id = req.model_id.trim();
    let model = get_model(state.catalog, model_id)
        .ok_or_else(|| ApiError::ModelNotFound(model_id.to_string()))?;

    session.open_dialog(model);
    dialog_view(&state, &session).map(Json)
}

async fn show_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailView>, ApiError> {
    let session = state.session(id).await?;
    dialog_view(&state, &session).map(Json)
}

/// Re-probe the dialog's model with the session key. Writes only the
/// slot of the dialog instance that asked, and only if the key is still
/// the same; the sweep state is left alone.
async fn probe_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailView>, ApiError> {
    let session = state.session(id).await?;
    let key = session.sequencer.key();

    let claimed = {
        let mut slot = session.dialog();
        let dialog = slot.as_mut().ok_or(ApiError::NoDialog)?;
        match key {
            Some(key) => dialog.begin_retest().map(|ticket| (ticket, key)),
            None => None,
        }
    };

    if let Some((ticket, key)) = claimed {
        let outcome = state.probe.probe(key.expose(), ticket.model_id).await;
        let same_key = session.sequencer.key().as_ref() == Some(&key);
        if let Some(dialog) = session.dialog().as_mut() {
            if same_key {
                dialog.finish_retest(ticket, outcome);
            } else {
                dialog.abandon_retest(ticket);
            }
        }
    }

    dialog_view(&state, &session).map(Json)
}

async fn close_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(id).await?;
    session.close_dialog();
    Ok(StatusCode::NO_CONTENT)
}

/// Current dialog view. Kicks off a background interpretation when the
/// error on display has not been explained yet.
fn dialog_view(state: &AppState, session: &Arc<Session>) -> Result<DetailView, ApiError> {
    let snapshot = session.sequencer.snapshot();
    let mut slot = session.dialog();
    let dialog = slot.as_mut().ok_or(ApiError::NoDialog)?;
    let sweep = snapshot.get(dialog.model().id);

    if let Some(raw) = dialog.current_error(sweep) {
        if dialog.claim_explanation(&raw) {
            spawn_explanation(
                Arc::clone(&state.interpreter),
                Arc::clone(session),
                dialog.generation(),
                raw,
            );
        }
    }
    Ok(dialog.view(sweep))
}

fn spawn_explanation(
    interpreter: Arc<ErrorInterpreter>,
    session: Arc<Session>,
    generation: u64,
    raw: String,
) {
    tokio::spawn(async move {
        let interpretation = interpreter.interpret(&raw).await;
        if let Some(dialog) = session.dialog().as_mut() {
            dialog.finish_explanation(generation, &raw, interpretation);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaselineStatus, ModelType};
    use crate::classify::KeyRejection;
    use crate::credential::ApiKey;
    use crate::provider::{ModelInfo, ProviderError};
    use async_trait::async_trait;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    const GOOD_KEY: &str = "AIzaSyGoodKey0001";
    const BLOCKED_ERR: &str = "[403 Forbidden] The caller does not have permission (PERMISSION_DENIED)";

    /// Accepts `GOOD_KEY` only; fails two specific models.
    struct MockGemini;

    #[async_trait]
    impl ModelProvider for MockGemini {
        fn provider_id(&self) -> &str {
            "mock"
        }

        async fn list_models(&self, key: &ApiKey, _page_size: u32) -> Result<Vec<ModelInfo>, ProviderError> {
            if key.expose() == GOOD_KEY {
                Ok(vec![])
            } else {
                Err(ProviderError::new(
                    Some(400),
                    "[400 Bad Request] API key not valid. Please pass a valid API key. (INVALID_ARGUMENT)",
                ))
            }
        }

        async fn get_model(&self, _key: &ApiKey, model_id: &str) -> Result<ModelInfo, ProviderError> {
            match model_id {
                "model-blocked" => Err(ProviderError::new(Some(403), BLOCKED_ERR)),
                "model-quota" => Err(ProviderError::new(
                    Some(429),
                    "[429 Too Many Requests] Quota exceeded (RESOURCE_EXHAUSTED)",
                )),
                _ => Ok(ModelInfo { id: model_id.to_string(), ..Default::default() }),
            }
        }
    }

    const fn descriptor(id: &'static str, model_type: ModelType) -> ModelDescriptor {
        ModelDescriptor {
            id,
            name: id,
            model_type,
            baseline_status: BaselineStatus::Working,
            rpm: 0,
            tpm: 0,
            rpd: 0,
            context_window: 1_048_576,
        }
    }

    static TEST_CATALOG: &[ModelDescriptor] = &[
        descriptor("model-ok", ModelType::Text),
        descriptor("model-blocked", ModelType::Image),
        descriptor("model-quota", ModelType::Text),
    ];

    fn create_test_server() -> TestServer {
        let state = AppState::new(TEST_CATALOG, Arc::new(MockGemini), ErrorInterpreter::disabled());
        TestServer::new(router(state)).unwrap()
    }

    async fn new_session(server: &TestServer) -> String {
        let response = server.post("/api/sessions").await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["session_id"].as_str().unwrap().to_string()
    }

    async fn wait_for_sweep(server: &TestServer, id: &str) -> Value {
        for _ in 0..200 {
            let view = server.get(&format!("/api/sessions/{id}/models")).await.json::<Value>();
            if view["summary"]["state"] == "done" {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sweep did not finish");
    }

    #[tokio::test]
    async fn test_health() {
        let server = create_test_server();
        let response = server.get("/api/health").await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["interpreter_enabled"], false);
    }

    #[tokio::test]
    async fn test_index_and_catalog() {
        let server = create_test_server();
        let page = server.get("/").await;
        page.assert_status_ok();
        assert!(page.text().contains("KeyScope"));

        let catalog = server.get("/api/catalog").await.json::<Value>();
        let ids: Vec<_> = catalog.as_array().unwrap().iter().map(|m| m["id"].clone()).collect();
        assert_eq!(ids, vec![json!("model-ok"), json!("model-blocked"), json!("model-quota")]);
        assert_eq!(catalog[1]["type"], "image");
        assert_eq!(catalog[1]["contextWindow"], 1_048_576);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let server = create_test_server();
        let response = server.get(&format!("/api/sessions/{}/models", Uuid::new_v4())).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert!(response.json::<Value>()["error"].as_str().unwrap().starts_with("session not found"));
    }

    #[tokio::test]
    async fn test_sweep_lifecycle() {
        let server = create_test_server();
        let id = new_session(&server).await;

        let idle = server.get(&format!("/api/sessions/{id}/models")).await.json::<Value>();
        assert_eq!(idle["summary"]["state"], "idle");
        assert_eq!(idle["refresh_enabled"], false);
        assert_eq!(idle["rows"].as_array().unwrap().len(), 3);

        let response = server
            .put(&format!("/api/sessions/{id}/key"))
            .json(&json!({ "api_key": GOOD_KEY }))
            .await;
        response.assert_status_ok();
        let first_run = response.json::<Value>()["run"].as_u64().unwrap();

        let done = wait_for_sweep(&server, &id).await;
        assert_eq!(done["summary"], json!({"state": "done", "working": 1, "total": 3}));
        assert_eq!(done["headline"], "1 working / 3 total");
        assert_eq!(done["refresh_enabled"], true);
        let labels: Vec<_> = done["rows"].as_array().unwrap().iter().map(|r| r["badge"]["label"].clone()).collect();
        assert_eq!(labels, vec![json!("Working"), json!("Blocked"), json!("Quota exceeded")]);

        let response = server.post(&format!("/api/sessions/{id}/refresh")).await;
        response.assert_status_ok();
        assert!(response.json::<Value>()["run"].as_u64().unwrap() > first_run);
        wait_for_sweep(&server, &id).await;

        server.delete(&format!("/api/sessions/{id}/key")).await.assert_status(StatusCode::NO_CONTENT);
        let cleared = server.get(&format!("/api/sessions/{id}/models")).await.json::<Value>();
        assert_eq!(cleared["summary"]["state"], "idle");
        assert!(cleared["rows"].as_array().unwrap().iter().all(|r| r["badge"]["status"] == "pending"));
    }

    #[tokio::test]
    async fn test_rejected_key_keeps_previous_sweep() {
        let server = create_test_server();
        let id = new_session(&server).await;

        server
            .put(&format!("/api/sessions/{id}/key"))
            .json(&json!({ "api_key": GOOD_KEY }))
            .await
            .assert_status_ok();
        let before = wait_for_sweep(&server, &id).await;

        let response = server
            .put(&format!("/api/sessions/{id}/key"))
            .json(&json!({ "api_key": "AIzaSyWrongKey999" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], KeyRejection::InvalidKey.message());

        let response = server
            .put(&format!("/api/sessions/{id}/key"))
            .json(&json!({ "api_key": "short" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "API key must be at least 10 characters.");

        let after = server.get(&format!("/api/sessions/{id}/models")).await.json::<Value>();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_refresh_needs_a_key() {
        let server = create_test_server();
        let id = new_session(&server).await;
        let response = server.post(&format!("/api/sessions/{id}/refresh")).await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "refresh unavailable: no API key set");
    }

    #[tokio::test]
    async fn test_dialog_flow() {
        let server = create_test_server();
        let id = new_session(&server).await;
        let dialog = format!("/api/sessions/{id}/dialog");

        server.get(&dialog).await.assert_status(StatusCode::NOT_FOUND);
        server
            .put(&dialog)
            .json(&json!({ "model_id": "no-such-model" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .put(&format!("/api/sessions/{id}/key"))
            .json(&json!({ "api_key": GOOD_KEY }))
            .await
            .assert_status_ok();
        wait_for_sweep(&server, &id).await;

        let view = server.put(&dialog).json(&json!({ "model_id": "model-blocked" })).await.json::<Value>();
        assert_eq!(view["model_type"], "Image");
        assert_eq!(view["context_window"], "1,048,576");
        assert_eq!(view["badge"]["status"], "blocked");
        assert_eq!(view["error"], BLOCKED_ERR);

        // Pass-through interpreter: the explanation settles on the raw text
        let mut explained = Value::Null;
        for _ in 0..200 {
            explained = server.get(&dialog).await.json::<Value>()["explanation"].clone();
            if explained["state"] == "ready" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(explained, json!({"state": "ready", "message": BLOCKED_ERR}));

        let retested = server.post(&format!("{dialog}/probe")).await.json::<Value>();
        assert_eq!(retested["retest"], json!({"status": "blocked", "error": BLOCKED_ERR}));
        assert_eq!(retested["testing"], false);

        server.delete(&dialog).await.assert_status(StatusCode::NO_CONTENT);
        server.get(&dialog).await.assert_status(StatusCode::NOT_FOUND);
    }

    const OLD_KEY: &str = "AIzaSyOldKey00001";
    const NEW_KEY: &str = "AIzaSyNewKey00002";

    /// Accepts any key. Once armed, holds the old key's `model-ok` lookup
    /// until released and then fails it.
    #[derive(Default)]
    struct HeldGemini {
        armed: AtomicBool,
        waiting: AtomicBool,
        release: Notify,
    }

    #[async_trait]
    impl ModelProvider for HeldGemini {
        fn provider_id(&self) -> &str {
            "held"
        }

        async fn list_models(&self, _key: &ApiKey, _page_size: u32) -> Result<Vec<ModelInfo>, ProviderError> {
            Ok(vec![])
        }

        async fn get_model(&self, key: &ApiKey, model_id: &str) -> Result<ModelInfo, ProviderError> {
            if key.expose() == OLD_KEY && model_id == "model-ok" && self.armed.load(Ordering::SeqCst) {
                self.waiting.store(true, Ordering::SeqCst);
                self.release.notified().await;
                return Err(ProviderError::new(Some(403), "OLD KEY 403 forbidden"));
            }
            Ok(ModelInfo { id: model_id.to_string(), ..Default::default() })
        }
    }

    #[tokio::test]
    async fn test_retest_from_old_key_skips_reopened_dialog() {
        let provider = Arc::new(HeldGemini::default());
        let state = AppState::new(TEST_CATALOG, provider.clone(), ErrorInterpreter::disabled());
        let server = TestServer::new(router(state)).unwrap();
        let id = new_session(&server).await;
        let key = format!("/api/sessions/{id}/key");
        let dialog = format!("/api/sessions/{id}/dialog");

        server.put(&key).json(&json!({ "api_key": OLD_KEY })).await.assert_status_ok();
        wait_for_sweep(&server, &id).await;
        server.put(&dialog).json(&json!({ "model_id": "model-ok" })).await.assert_status_ok();
        provider.armed.store(true, Ordering::SeqCst);

        let stalled = async { server.post(&format!("{dialog}/probe")).await };
        let meanwhile = async {
            while !provider.waiting.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            server.put(&key).json(&json!({ "api_key": NEW_KEY })).await.assert_status_ok();
            wait_for_sweep(&server, &id).await;
            let reopened = server.put(&dialog).json(&json!({ "model_id": "model-ok" })).await.json::<Value>();
            assert_eq!(reopened["retest"], Value::Null);
            provider.release.notify_one();
        };
        let (stalled, ()) = tokio::join!(stalled, meanwhile);
        stalled.assert_status_ok();

        let view = server.get(&dialog).await.json::<Value>();
        assert_eq!(view["retest"], Value::Null);
        assert_eq!(view["testing"], false);
        assert_eq!(view["badge"]["status"], "working");
    }

    #[tokio::test]
    async fn test_interpret_endpoint() {
        let server = create_test_server();
        let response = server
            .post("/api/interpret")
            .json(&json!({ "raw_error": "429 RESOURCE_EXHAUSTED" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["message"], "429 RESOURCE_EXHAUSTED");
    }

    #[tokio::test]
    async fn test_delete_session() {
        let server = create_test_server();
        let id = new_session(&server).await;
        assert_eq!(server.get("/api/health").await.json::<Value>()["active_sessions"], 1);

        server.delete(&format!("/api/sessions/{id}")).await.assert_status(StatusCode::NO_CONTENT);
        server.delete(&format!("/api/sessions/{id}")).await.assert_status(StatusCode::NOT_FOUND);
    }
}
