//! REST API server for the back-office assistants
//!
//! Exposes the agent loop and the remembered-context store over HTTP.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{Agent, LoopSettings};
use crate::context::ContextStore;
use crate::error::AgentError;
use crate::models::{AgentProfile, ConversationTurn, LinkedEntity, NoteCategory, NoteSelector};
use crate::provider::Provider;
use crate::tools::{create_registry, Books};
use crate::Result;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub profile: Option<String>,
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub category: String,
    pub content: String,
    pub linked_entity: Option<LinkedEntity>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNotesQuery {
    pub text: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiReply = (StatusCode, Json<ApiResponse>);

fn bad_request(message: impl Into<String>) -> ApiReply {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(message.into())),
    )
}

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        AgentError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AgentError::Provider(_) => StatusCode::BAD_GATEWAY,
        AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    agents: Arc<HashMap<AgentProfile, Arc<Agent>>>,
    store: Arc<dyn ContextStore>,
    run_deadline: Duration,
}

impl ApiState {
    /// Build one agent per profile over a shared provider, books and store
    pub fn new(
        provider: Arc<dyn Provider>,
        books: Arc<Books>,
        store: Arc<dyn ContextStore>,
        settings: LoopSettings,
        run_deadline: Duration,
    ) -> Result<Self> {
        let mut agents = HashMap::new();

        for profile in [AgentProfile::Bookkeeping, AgentProfile::FinancialAnalysis] {
            let registry = create_registry(
                profile,
                books.clone(),
                store.clone(),
                settings.suggestion_limit,
            )?;
            let agent = Agent::new(
                profile,
                provider.clone(),
                Arc::new(registry),
                store.clone(),
                settings.clone(),
            );
            agents.insert(profile, Arc::new(agent));
        }

        Ok(Self {
            agents: Arc::new(agents),
            store,
            run_deadline,
        })
    }

    fn agent(&self, profile: AgentProfile) -> Result<Arc<Agent>> {
        self.agents
            .get(&profile)
            .cloned()
            .ok_or_else(|| AgentError::InvalidRequest(format!("no assistant for {}", profile)))
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Assistant Endpoint
/// =============================

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiReply {
    let profile = match req.profile.as_deref() {
        None => AgentProfile::default(),
        Some(raw) => match raw.parse::<AgentProfile>() {
            Ok(profile) => profile,
            Err(e) => return bad_request(e),
        },
    };

    let query = req.query.trim();
    if query.is_empty() {
        return bad_request("query must not be empty");
    }

    info!(%profile, history = req.history.len(), "Received assistant request");

    let agent = match state.agent(profile) {
        Ok(agent) => agent,
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    };

    match agent
        .run_with_deadline(query, req.history, state.run_deadline)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(e) => {
            error!(%profile, error = %e, "Assistant run failed");
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Remembered Context Endpoints
/// =============================

async fn list_notes(State(state): State<ApiState>, Query(params): Query<NotesQuery>) -> ApiReply {
    let category = match params.category.as_deref().map(str::parse::<NoteCategory>) {
        None => None,
        Some(Ok(category)) => Some(category),
        Some(Err(e)) => return bad_request(e),
    };

    match state.store.load_notes(category).await {
        Ok(notes) => (StatusCode::OK, Json(ApiResponse::success(notes))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn create_note(
    State(state): State<ApiState>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiReply {
    let category = match req.category.parse::<NoteCategory>() {
        Ok(category) => category,
        Err(e) => return bad_request(e),
    };
    if req.content.trim().is_empty() {
        return bad_request("content must not be empty");
    }

    match state
        .store
        .save_note(category, req.content.trim(), req.linked_entity)
        .await
    {
        Ok(note_id) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(serde_json::json!({
                "note_id": note_id,
                "category": category,
            }))),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn delete_note_by_id(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiReply {
    delete_matching(&state, NoteSelector::Id(id)).await
}

async fn delete_notes_by_text(
    State(state): State<ApiState>,
    Query(params): Query<DeleteNotesQuery>,
) -> ApiReply {
    match params.text.filter(|t| !t.trim().is_empty()) {
        Some(text) => delete_matching(&state, NoteSelector::TextMatch(text)).await,
        None => bad_request("text query parameter is required"),
    }
}

async fn delete_matching(state: &ApiState, selector: NoteSelector) -> ApiReply {
    match state.store.delete_note(&selector).await {
        Ok(deleted) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "deleted": deleted }))),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/assistant/chat", post(chat_handler))
        .route(
            "/api/notes",
            get(list_notes).post(create_note).delete(delete_notes_by_text),
        )
        .route("/api/notes/:id", delete(delete_note_by_id))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InMemoryContextStore;
    use crate::provider::{ProviderResponse, ScriptedProvider};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn state_with(responses: Vec<ProviderResponse>) -> ApiState {
        ApiState::new(
            Arc::new(ScriptedProvider::from_responses(responses)),
            Arc::new(Books::brokerage_sample()),
            Arc::new(InMemoryContextStore::new()),
            LoopSettings::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn send(router: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, ApiResponse) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_chat_returns_run_result() {
        let router = create_router(state_with(vec![ProviderResponse::text(
            "Interest on the line of credit goes to 7100.",
        )]));

        let (status, body) = send(
            router,
            Method::POST,
            "/api/assistant/chat",
            Some(serde_json::json!({
                "profile": "financial_analysis",
                "query": "What account handles interest on our line of credit?"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        let data = body.data.unwrap();
        assert_eq!(data["termination"], "completed");
        assert_eq!(data["tool_calls_made"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_chat_rejects_unknown_profile() {
        let router = create_router(state_with(vec![]));

        let (status, body) = send(
            router,
            Method::POST,
            "/api/assistant/chat",
            Some(serde_json::json!({ "profile": "marketing", "query": "hi" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_notes_lifecycle() {
        let router = create_router(state_with(vec![]));

        let (status, created) = send(
            router.clone(),
            Method::POST,
            "/api/notes",
            Some(serde_json::json!({
                "category": "account_mapping",
                "content": "Escrow deposits go to 1010"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let note_id = created.data.unwrap()["note_id"].as_str().unwrap().to_string();

        let (_, listed) = send(router.clone(), Method::GET, "/api/notes?category=account_mapping", None).await;
        assert_eq!(listed.data.unwrap().as_array().unwrap().len(), 1);

        let (status, deleted) = send(
            router.clone(),
            Method::DELETE,
            &format!("/api/notes/{}", note_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted.data.unwrap()["deleted"], 1);

        let (status, _) = send(router, Method::DELETE, "/api/notes", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(state_with(vec![]));
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
