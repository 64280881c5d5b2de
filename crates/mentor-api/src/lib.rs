//! Mentor API crate - axum HTTP server and route handlers.
//!
//! Provides the REST surface for the tutoring backend: the chat endpoint,
//! thread listing/history/deletion, knowledge-base management, and health.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
