//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path/body parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_chat::{ChatRequest, ChatTurn};
use mentor_core::types::{Hint, KnowledgeDraft, KnowledgeEntry, Message, SourceRef, Thread};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct KnowledgeListParams {
    pub grade: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectsParams {
    pub grade: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub thread_id: Uuid,
    pub sources: Vec<SourceRef>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradesResponse {
    pub grades: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectsResponse {
    pub subjects: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub knowledge_entries: u64,
    pub threads: u64,
    pub vector_index_size: u64,
}

impl From<ChatTurn> for ChatResponseBody {
    fn from(turn: ChatTurn) -> Self {
        Self {
            response: turn.response,
            thread_id: turn.thread_id,
            sources: turn.sources,
            timestamp: turn.timestamp,
        }
    }
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - handle one student message.
///
/// Always returns the full response shape. A generation-backend outage is
/// signalled with 503 while still carrying the apologetic response text, so
/// the caller sees both the response turn and the failure.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let turn = state.chat.handle(request).await?;
    let failed = turn.generation_failed;
    let body = ChatResponseBody::from(turn);

    let status = if failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((status, Json(body)))
}

// =============================================================================
// Threads
// =============================================================================

/// GET /threads - all threads, most recently active first.
pub async fn list_threads(State(state): State<AppState>) -> Result<Json<Vec<Thread>>, ApiError> {
    let threads = state.chat.ledger().list_threads()?;
    Ok(Json(threads))
}

/// GET /threads/{id} - a thread's messages in chronological order.
pub async fn thread_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    match state.chat.ledger().thread_messages(id)? {
        Some(messages) => Ok(Json(messages)),
        None => Err(ApiError::NotFound(format!("thread not found: {}", id))),
    }
}

/// DELETE /threads/{id} - delete a thread and its messages.
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.chat.ledger().delete_thread(id)? {
        return Err(ApiError::NotFound(format!("thread not found: {}", id)));
    }
    Ok(Json(DeletedResponse {
        message: "Thread deleted successfully".to_string(),
    }))
}

// =============================================================================
// Knowledge base
// =============================================================================

/// GET /knowledge - list entries with optional grade/subject filters.
pub async fn list_knowledge(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeListParams>,
) -> Result<Json<Vec<KnowledgeEntry>>, ApiError> {
    let hint = Hint::new(params.grade, params.subject);
    let entries = state.knowledge_store.list(&hint)?;
    Ok(Json(entries))
}

/// POST /knowledge - create an entry in both stores.
pub async fn add_knowledge(
    State(state): State<AppState>,
    Json(draft): Json<KnowledgeDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.knowledge.add(&draft).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /knowledge/{id} - update an entry in both stores.
pub async fn update_knowledge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<KnowledgeDraft>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    match state.knowledge.update(id, &draft).await? {
        Some(entry) => Ok(Json(entry)),
        None => Err(ApiError::NotFound(format!("entry not found: {}", id))),
    }
}

/// DELETE /knowledge/{id} - delete an entry from both stores.
pub async fn delete_knowledge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.knowledge.delete(id).await? {
        return Err(ApiError::NotFound(format!("entry not found: {}", id)));
    }
    Ok(Json(DeletedResponse {
        message: "Entry deleted successfully".to_string(),
    }))
}

/// GET /knowledge/meta/grades - distinct grade levels.
pub async fn list_grades(State(state): State<AppState>) -> Result<Json<GradesResponse>, ApiError> {
    let grades = state.knowledge_store.distinct_grades()?;
    Ok(Json(GradesResponse { grades }))
}

/// GET /knowledge/meta/subjects?grade=... - distinct subjects for a grade.
pub async fn list_subjects(
    State(state): State<AppState>,
    Query(params): Query<SubjectsParams>,
) -> Result<Json<SubjectsResponse>, ApiError> {
    let grade = params
        .grade
        .ok_or_else(|| ApiError::BadRequest("Parameter 'grade' is required".to_string()))?;
    let subjects = state.knowledge_store.distinct_subjects(&grade)?;
    Ok(Json(SubjectsResponse { subjects }))
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let knowledge_entries = state.knowledge_store.count()?;
    let threads = state.chat.ledger().list_threads()?.len() as u64;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        knowledge_entries,
        threads,
        vector_index_size: state.semantic.len() as u64,
    }))
}
