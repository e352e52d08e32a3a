pub mod error;
pub mod form;
pub mod health;
pub mod register;
pub mod storage;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use signup_db::Database;

use crate::storage::UploadDir;

/// Request body cap. Large enough for a few photos and a voice note.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub uploads: UploadDir,
}

/// All routes of the service, with state attached.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health))
        .route("/register", post(register::register))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
