//! HTTP surface.
//!
//! Routes:
//!
//! | Method | Path        | Auth   |
//! |--------|-------------|--------|
//! | GET    | `/`         | cookie optional, JSON dashboard |
//! | POST   | `/`         | login form, sets the `auth` cookie |
//! | POST   | `/register` | registration form, sets the `auth` cookie |
//! | GET    | `/logout`   | clears the `auth` cookie |
//! | POST   | `/upload`   | multipart field `file` |
//! | GET    | `/files`    | JSON listing with `can_delete` |
//! | POST   | `/delete`   | form field `filename`, owner or admin |
//! | GET    | `/download` | `?filename=` |
//! | GET    | `/openFile` | `?filename=`, owner or admin |
//! | POST   | `/saveFile` | `?filename=` with raw body, owner or admin |
//!
//! Form submissions answer with a 302 back to `/`.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::host::FileHost;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub host: Arc<FileHost>,
}

/// Create the application router.
pub fn router(host: Arc<FileHost>) -> Router {
    let body_limit = usize::try_from(host.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::dashboard).post(handlers::login))
        .route("/register", post(handlers::register))
        .route("/logout", get(handlers::logout))
        .route("/upload", post(handlers::upload))
        .route("/files", get(handlers::list_files))
        .route("/delete", post(handlers::delete_file))
        .route("/download", get(handlers::download))
        .route("/openFile", get(handlers::open_file))
        .route("/saveFile", post(handlers::save_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { host })
}
