//! JSON HTTP API over the query layer.
//!
//! Handlers are thin: they parse request parameters, call one query-layer
//! operation and serialize the result. Query-layer failures keep their
//! `<type>:database` code; request validation failures use `<type>:api`.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET` | `/api/models` | Resolved provider table |
//! | `GET` | `/api/history` | Page of a user's chats |
//! | `GET` `DELETE` | `/api/chats/{id}` | Fetch or delete a chat |
//! | `PATCH` | `/api/chats/{id}/visibility` | Change chat visibility |
//! | `GET` | `/api/chats/{id}/messages` | Messages of a chat |
//! | `GET` | `/api/chats/{id}/streams` | Stream ids of a chat |
//! | `GET` `PATCH` | `/api/vote` | List votes / vote on a message |
//! | `GET` `POST` `DELETE` | `/api/document` | Document versions |
//! | `GET` | `/api/suggestions` | Suggestions for a document |
//! | `GET` `POST` | `/api/knowledge-docs` | List / create knowledge docs |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found:database", "message": "Chat with id abc not found" } }
//! ```
//!
//! `bad_request:*` maps to 400 and `not_found:*` to 404.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use chatstore_core::models::{
    timestamp, ArtifactKind, Chat, Document, KnowledgeDoc, KnowledgeDocStatus, Message,
    NewDocument, NewKnowledgeDoc, Suggestion, Visibility, Vote, VoteType,
};
use chatstore_core::{DbError, Queries};

use crate::config::Config;
use crate::db;
use crate::providers::{ModelRef, ProviderMode, ProviderSelector};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queries: Queries,
    pub providers: Arc<ProviderSelector>,
}

impl AppState {
    pub fn new(queries: Queries, providers: ProviderSelector) -> Self {
        Self {
            queries,
            providers: Arc::new(providers),
        }
    }
}

/// Starts the HTTP server on `[server].bind` and serves until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let providers = ProviderSelector::from_config(&config.providers)?;
    let queries = db::open_queries(config).await?;
    let app = router(AppState::new(queries, providers));

    let bind_addr = config.server.bind.clone();
    println!("chatstore API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/models", get(handle_models))
        .route("/api/history", get(handle_history))
        .route("/api/chats/{id}", get(handle_get_chat).delete(handle_delete_chat))
        .route("/api/chats/{id}/visibility", patch(handle_update_visibility))
        .route("/api/chats/{id}/messages", get(handle_messages))
        .route("/api/chats/{id}/streams", get(handle_streams))
        .route("/api/vote", get(handle_get_votes).patch(handle_vote))
        .route(
            "/api/document",
            get(handle_get_document)
                .post(handle_save_document)
                .delete(handle_delete_document),
        )
        .route("/api/suggestions", get(handle_suggestions))
        .route(
            "/api/knowledge-docs",
            get(handle_list_knowledge_docs).post(handle_create_knowledge_doc),
        )
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_REQUEST
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.message().to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request:api".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found:api".to_string(),
        message: message.into(),
    }
}

// ============ GET /health, /api/models ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelsResponse<'a> {
    mode: ProviderMode,
    language_models: Vec<NamedModel<'a>>,
    image_models: Vec<NamedModel<'a>>,
}

#[derive(Serialize)]
struct NamedModel<'a> {
    name: &'a str,
    #[serde(flatten)]
    model: &'a ModelRef,
}

async fn handle_models(State(state): State<AppState>) -> Response {
    let providers = &state.providers;
    Json(ModelsResponse {
        mode: providers.mode(),
        language_models: providers
            .language_models()
            .map(|(name, model)| NamedModel { name, model })
            .collect(),
        image_models: providers
            .image_models()
            .map(|(name, model)| NamedModel { name, model })
            .collect(),
    })
    .into_response()
}

// ============ Chats ============

#[derive(Deserialize)]
struct HistoryParams {
    user_id: Option<String>,
    limit: Option<usize>,
    starting_after: Option<String>,
    ending_before: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    chats: Vec<Chat>,
    has_more: bool,
}

async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let user_id = params
        .user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| bad_request("user_id is required"))?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }
    if params.starting_after.is_some() && params.ending_before.is_some() {
        return Err(bad_request(
            "Only one of starting_after or ending_before can be provided",
        ));
    }

    let page = state
        .queries
        .get_chats_by_user_id(
            &user_id,
            limit,
            params.starting_after.as_deref(),
            params.ending_before.as_deref(),
        )
        .await?;

    Ok(Json(HistoryResponse {
        chats: page.items,
        has_more: page.has_more,
    }))
}

async fn handle_get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Chat>, AppError> {
    state
        .queries
        .get_chat_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("Chat with id {} not found", id)))
}

async fn handle_delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.queries.delete_chat_by_id(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Deserialize)]
struct VisibilityBody {
    visibility: Visibility,
}

async fn handle_update_visibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VisibilityBody>,
) -> Result<StatusCode, AppError> {
    state
        .queries
        .update_chat_visibility_by_id(&id, body.visibility)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.queries.get_messages_by_chat_id(&id).await?))
}

async fn handle_streams(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.queries.get_stream_ids_by_chat_id(&id).await?))
}

// ============ Votes ============

#[derive(Deserialize)]
struct VoteParams {
    chat_id: String,
}

async fn handle_get_votes(
    State(state): State<AppState>,
    Query(params): Query<VoteParams>,
) -> Result<Json<Vec<Vote>>, AppError> {
    Ok(Json(state.queries.get_votes_by_chat_id(&params.chat_id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteBody {
    chat_id: String,
    message_id: String,
    #[serde(rename = "type")]
    vote_type: VoteType,
}

async fn handle_vote(
    State(state): State<AppState>,
    Json(body): Json<VoteBody>,
) -> Result<Json<Vote>, AppError> {
    let vote = state
        .queries
        .vote_message(&body.chat_id, &body.message_id, body.vote_type)
        .await?;
    Ok(Json(vote))
}

// ============ Documents ============

#[derive(Deserialize)]
struct DocumentParams {
    id: String,
}

async fn handle_get_document(
    State(state): State<AppState>,
    Query(params): Query<DocumentParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    let versions = state.queries.get_documents_by_id(&params.id).await?;
    if versions.is_empty() {
        return Err(not_found(format!("Document with id {} not found", params.id)));
    }
    Ok(Json(versions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentBody {
    title: String,
    #[serde(default)]
    kind: ArtifactKind,
    #[serde(default)]
    content: Option<String>,
    user_id: String,
    #[serde(default)]
    chat_id: Option<String>,
}

async fn handle_save_document(
    State(state): State<AppState>,
    Query(params): Query<DocumentParams>,
    Json(body): Json<DocumentBody>,
) -> Result<Json<Document>, AppError> {
    let document = state
        .queries
        .save_document(&NewDocument {
            document_id: params.id,
            title: body.title,
            kind: body.kind,
            content: body.content,
            user_id: body.user_id,
            chat_id: body.chat_id,
            created_at: None,
        })
        .await?;
    Ok(Json(document))
}

#[derive(Deserialize)]
struct DeleteDocumentParams {
    id: String,
    timestamp: String,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Query(params): Query<DeleteDocumentParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let after = timestamp::parse(&params.timestamp)
        .map_err(|_| bad_request(format!("invalid timestamp: {}", params.timestamp)))?;
    let deleted = state
        .queries
        .delete_documents_by_id_after_timestamp(&params.id, after)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[derive(Deserialize)]
struct SuggestionParams {
    document_id: String,
}

async fn handle_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(
        state
            .queries
            .get_suggestions_by_document_id(&params.document_id)
            .await?,
    ))
}

// ============ Knowledge documents ============

#[derive(Deserialize)]
struct KnowledgeParams {
    status: Option<String>,
}

async fn handle_list_knowledge_docs(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeParams>,
) -> Result<Json<Vec<KnowledgeDoc>>, AppError> {
    let status = match params.status {
        Some(s) => s
            .parse::<KnowledgeDocStatus>()
            .map_err(|e| bad_request(e.to_string()))?,
        None => KnowledgeDocStatus::Pending,
    };
    Ok(Json(state.queries.get_knowledge_docs_by_status(status).await?))
}

async fn handle_create_knowledge_doc(
    State(state): State<AppState>,
    Json(body): Json<NewKnowledgeDoc>,
) -> Result<(StatusCode, Json<KnowledgeDoc>), AppError> {
    let doc = state.queries.create_knowledge_doc(&body).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}
