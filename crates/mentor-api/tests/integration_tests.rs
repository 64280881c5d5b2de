//! Integration tests for the Mentor API.
//!
//! Covers every route's happy and error paths. Each test builds an
//! independent in-memory state with a mock embedding service and a
//! scripted mock generator.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use mentor_api::create_router;
use mentor_api::handlers::{
    ChatResponseBody, GradesResponse, HealthResponse, SubjectsResponse,
};
use mentor_api::state::AppState;
use mentor_chat::{
    AnswerComposer, ChatPipeline, ConversationLedger, RetrievalCoordinator, TitleComposer, APOLOGY,
};
use mentor_core::config::MentorConfig;
use mentor_llm::MockGenerator;
use mentor_storage::{Database, KnowledgeRepository};
use mentor_vector::{KnowledgePipeline, MockEmbedding, SemanticIndex};

// =============================================================================
// Helpers
// =============================================================================

/// Create a fresh AppState with in-memory DB, mock embedding, and the given
/// generator.
fn make_state_with(generator: MockGenerator) -> AppState {
    let config = MentorConfig::default();
    let db = Arc::new(Database::in_memory().unwrap());
    let store = Arc::new(KnowledgeRepository::new(Arc::clone(&db)));
    let semantic = Arc::new(SemanticIndex::for_embedder(Arc::new(MockEmbedding::new())));
    let generator: Arc<MockGenerator> = Arc::new(generator);
    let timeout = Duration::from_secs(10);

    let chat = ChatPipeline::new(
        RetrievalCoordinator::new(Arc::clone(&store), Arc::clone(&semantic), 5, 5, timeout),
        TitleComposer::new(generator.clone(), 30, 0.7, timeout),
        AnswerComposer::new(generator.clone(), 1000, 0.7, timeout),
        ConversationLedger::new(Arc::clone(&db)),
    );
    let knowledge = KnowledgePipeline::new(Arc::clone(&store), Arc::clone(&semantic));

    AppState::new(config, db, store, semantic, knowledge, chat)
}

fn make_state() -> AppState {
    make_state_with(MockGenerator::with_reply("mock answer"))
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

/// Build a GET request.
fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Build a POST request with a JSON body.
fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Build a PUT request with a JSON body.
fn put_json(uri: &str, json: &Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Build a DELETE request.
fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

fn sample_entry_json() -> Value {
    json!({
        "title": "Addition basics",
        "question": "What is 2 + 2?",
        "answer_markdown": "2 + 2 = 4",
        "subject": "Mathematics",
        "grade_level": "Elementary",
        "tags": ["arithmetic"],
        "priority": 1
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_happy_path() {
    let app = make_app();
    let resp = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.knowledge_entries, 0);
    assert_eq!(health.threads, 0);
    assert_eq!(health.vector_index_size, 0);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_happy_path_creates_thread() {
    let generator = MockGenerator::default();
    generator.push_reply("Math: Adding Numbers"); // title
    generator.push_reply("2 + 2 = 4!"); // answer
    let state = make_state_with(generator);
    let app = create_router(state.clone());

    let resp = app
        .oneshot(post_json(
            "/chat",
            &json!({"message": "What is 2+2?", "grade": "Elementary", "subject": "Mathematics"}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let body: ChatResponseBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.response, "2 + 2 = 4!");

    // Exactly one thread with the composed title.
    let threads = state.chat.ledger().list_threads().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, body.thread_id);
    assert_eq!(threads[0].title, "Math: Adding Numbers");
}

#[tokio::test]
async fn test_chat_missing_message_is_bad_request() {
    let app = make_app();
    let resp = app
        .oneshot(post_json("/chat", &json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let bytes = body_bytes(resp).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_chat_reuses_thread() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/chat", &json!({"message": "first"})))
        .await
        .unwrap();
    let first: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    let resp = app
        .oneshot(post_json(
            "/chat",
            &json!({"message": "second", "thread_id": first.thread_id}),
        ))
        .await
        .unwrap();
    let second: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    assert_eq!(first.thread_id, second.thread_id);
    assert_eq!(state.chat.ledger().list_threads().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_with_context_returns_sources() {
    let generator = MockGenerator::default();
    generator.push_reply("Title");
    generator.push_reply("grounded answer");
    let state = make_state_with(generator);
    let app = create_router(state.clone());

    // Seed a matching knowledge entry through the API.
    let resp = app
        .clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .oneshot(post_json(
            "/chat",
            &json!({"message": "What is 2 + 2?", "grade": "Elementary", "subject": "Mathematics"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.sources.len(), 1);
    assert_eq!(body.sources[0].title, "Addition basics");
    assert_eq!(body.sources[0].excerpt, "What is 2 + 2?");
}

#[tokio::test]
async fn test_chat_generation_failure_returns_apology_with_503() {
    let state = make_state_with(MockGenerator::failing());
    let app = create_router(state.clone());

    let resp = app
        .oneshot(post_json("/chat", &json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    // The full response shape still comes back, carrying the apology.
    let body: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.response, APOLOGY);

    // No assistant message was persisted for the failed generation.
    let messages = state
        .chat
        .ledger()
        .thread_messages(body.thread_id)
        .unwrap()
        .unwrap();
    assert_eq!(messages.len(), 1);
}

// =============================================================================
// Threads
// =============================================================================

#[tokio::test]
async fn test_threads_empty_list() {
    let app = make_app();
    let resp = app.oneshot(get("/threads")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_thread_messages_after_chat() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/chat", &json!({"message": "hi there"})))
        .await
        .unwrap();
    let chat_body: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    let resp = app
        .oneshot(get(&format!("/threads/{}", chat_body.thread_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let messages: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[0]["content"], "hi there");
    assert_eq!(messages[1]["sender"], "assistant");
}

#[tokio::test]
async fn test_thread_messages_not_found() {
    let app = make_app();
    let resp = app
        .oneshot(get(&format!("/threads/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_thread() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/chat", &json!({"message": "doomed thread"})))
        .await
        .unwrap();
    let chat_body: ChatResponseBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    let resp = app
        .clone()
        .oneshot(delete(&format!("/threads/{}", chat_body.thread_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(get(&format!("/threads/{}", chat_body.thread_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_thread_not_found() {
    let app = make_app();
    let resp = app
        .oneshot(delete(&format!("/threads/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Knowledge base
// =============================================================================

#[tokio::test]
async fn test_knowledge_create_and_list() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(created["title"], "Addition basics");

    // Vector projection was written alongside the row.
    assert_eq!(state.semantic.len(), 1);

    let resp = app.oneshot(get("/knowledge")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_knowledge_create_requires_title_and_body() {
    let app = make_app();
    let resp = app
        .oneshot(post_json("/knowledge", &json!({"title": "No body at all"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_knowledge_list_filtered() {
    let app = make_app();
    app.clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(get("/knowledge?grade=Elementary&subject=Mathematics"))
        .await
        .unwrap();
    let listed: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let resp = app
        .oneshot(get("/knowledge?subject=Science"))
        .await
        .unwrap();
    let listed: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_knowledge_update() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();
    let created: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let mut updated_json = sample_entry_json();
    updated_json["title"] = json!("Addition revised");
    let resp = app
        .oneshot(put_json(&format!("/knowledge/{}", id), &updated_json))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(updated["title"], "Addition revised");
    assert_eq!(state.semantic.len(), 1);
}

#[tokio::test]
async fn test_knowledge_update_not_found() {
    let app = make_app();
    let resp = app
        .oneshot(put_json(
            &format!("/knowledge/{}", Uuid::new_v4()),
            &sample_entry_json(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_knowledge_delete_removes_from_both_stores() {
    let state = make_state();
    let app = create_router(state.clone());

    let resp = app
        .clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();
    let created: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(state.semantic.len(), 1);

    let resp = app
        .oneshot(delete(&format!("/knowledge/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.semantic.len(), 0);
    assert_eq!(state.knowledge_store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_knowledge_delete_not_found() {
    let app = make_app();
    let resp = app
        .oneshot(delete(&format!("/knowledge/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Knowledge metadata
// =============================================================================

#[tokio::test]
async fn test_meta_grades() {
    let app = make_app();
    app.clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();

    let resp = app.oneshot(get("/knowledge/meta/grades")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: GradesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.grades, vec!["Elementary".to_string()]);
}

#[tokio::test]
async fn test_meta_subjects_requires_grade() {
    let app = make_app();
    let resp = app.oneshot(get("/knowledge/meta/subjects")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meta_subjects_for_grade() {
    let app = make_app();
    app.clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();

    let resp = app
        .oneshot(get("/knowledge/meta/subjects?grade=Elementary"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: SubjectsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.subjects, vec!["Mathematics".to_string()]);
}

// =============================================================================
// Health reflects activity
// =============================================================================

#[tokio::test]
async fn test_health_counts_activity() {
    let app = make_app();
    app.clone()
        .oneshot(post_json("/knowledge", &sample_entry_json()))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/chat", &json!({"message": "hello"})))
        .await
        .unwrap();

    let resp = app.oneshot(get("/health")).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.knowledge_entries, 1);
    assert_eq!(health.threads, 1);
    assert_eq!(health.vector_index_size, 1);
}
