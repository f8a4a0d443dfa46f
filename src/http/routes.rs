use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/comment", post(handlers::comment_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
}

pub fn media() -> Router<AppState> {
    Router::new()
        .route("/media/upload", post(handlers::create_upload))
        .route("/media/:id", get(handlers::get_media))
}
