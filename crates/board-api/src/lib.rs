pub mod auth;
pub mod cleanup;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod state;

use std::path::Path;

use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    middleware::from_fn_with_state,
    routing::{delete, get},
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use board_guard::sanitize::SECURITY_HEADERS;

pub use state::{ApiConfig, AppState, AppStateInner};

/// Build the full HTTP surface. Unknown paths are served from `static_dir`
/// when one is given, with `index.html` as the catch-all page.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/posts/{id}/comments/{comment_id}",
            delete(comments::delete_comment),
        )
        .route(
            "/auth/session",
            get(auth::session_status).post(auth::create_session),
        )
        .route("/auth/rate-limit", get(auth::rate_limit_status))
        .layer(from_fn_with_state(state.clone(), middleware::require_api_key));

    let mut app = Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state);

    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).not_found_service(index));
    }

    for &(name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}
