use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, TokenPair};
use crate::app::engagement::EngagementService;
use crate::app::media::{MediaService, UploadIntent};
use crate::app::posts::PostService;
use crate::domain::media::MediaKind;
use crate::domain::post::{DashboardPost, Post};
use crate::http::{AppError, AuthUser, Guest};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 200;
const MAX_CONTENT_LEN: usize = 10_000;
const MAX_COMMENT_LEN: usize = 1000;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<crate::domain::user::User>,
}

impl AuthTokenResponse {
    fn new(message: String, tokens: TokenPair, user: Option<crate::domain::user::User>) -> Self {
        Self {
            message,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            user,
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

pub async fn register(
    _guest: Guest,
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::bad_request("username cannot be empty"));
    }
    if payload.password != payload.password_confirm {
        return Err(AppError::bad_request("passwords do not match"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let (user, tokens) = service
        .register(username, payload.password)
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    // 23505 = unique violation; the only unique column is username
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::conflict("username already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    Ok(Json(AuthTokenResponse::new(
        "Account created successfully!".to_string(),
        tokens,
        Some(user),
    )))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    _guest: Guest,
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let tokens = service
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse::new(
            format!("Welcome back, {}!", payload.username.trim()),
            tokens,
            None,
        ))),
        // One generic message for unknown user and wrong password alike.
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    // Result intentionally ignored: logging out twice is fine.
    let _ = service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to log out")
        })?;

    Ok(Json(LogoutResponse {
        message: "You have been logged out successfully.".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse::new(
            "Session refreshed.".to_string(),
            tokens,
            None,
        ))),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let service = auth_service(&state);
    let user = service.get_current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn dashboard(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DashboardPost>>, AppError> {
    let service = PostService::new(state.db.clone());
    let posts = service.dashboard().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load dashboard");
        AppError::internal("failed to load dashboard")
    })?;

    Ok(Json(posts))
}

/// Reject attachment ids that do not belong to the caller or are of the
/// wrong kind. Missing and foreign media get the same error.
async fn check_attachment(
    media: &MediaService,
    media_id: Option<Uuid>,
    owner_id: Uuid,
    expected: MediaKind,
    field: &'static str,
) -> Result<(), AppError> {
    let Some(media_id) = media_id else {
        return Ok(());
    };

    let kind = media
        .owned_media_kind(media_id, owner_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, media_id = %media_id, "failed to look up media");
            AppError::internal("failed to look up media")
        })?;

    match kind {
        Some(kind) if kind == expected => Ok(()),
        _ => Err(AppError::bad_request(format!("invalid {}", field))),
    }
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub image_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct PostResponse {
    pub message: String,
    #[serde(flatten)]
    pub post: Post,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let title = payload.title.trim().to_string();
    let content = payload.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::bad_request("title and content are required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request("title must be at most 200 characters"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::bad_request("content must be at most 10000 characters"));
    }

    let media = MediaService::new(
        state.db.clone(),
        state.storage.clone(),
        state.s3_public_endpoint.clone(),
    );
    check_attachment(&media, payload.image_id, auth.user_id, MediaKind::Image, "image_id").await?;
    check_attachment(&media, payload.video_id, auth.user_id, MediaKind::Video, "video_id").await?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(auth.user_id, title, content, payload.image_id, payload.video_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, owner_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(PostResponse {
        message: "Post created successfully!".to_string(),
        post,
    }))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get_post(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
    pub image_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let title = payload.title.trim().to_string();
    let content = payload.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::bad_request("title and content are required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request("title must be at most 200 characters"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::bad_request("content must be at most 10000 characters"));
    }

    let media = MediaService::new(
        state.db.clone(),
        state.storage.clone(),
        state.s3_public_endpoint.clone(),
    );
    check_attachment(&media, payload.image_id, auth.user_id, MediaKind::Image, "image_id").await?;
    check_attachment(&media, payload.video_id, auth.user_id, MediaKind::Video, "video_id").await?;

    let service = PostService::new(state.db.clone());
    let post = service
        .update_post(id, auth.user_id, title, content, payload.image_id, payload.video_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match post {
        Some(post) => Ok(Json(PostResponse {
            message: "Post updated successfully!".to_string(),
            post,
        })),
        // Ownership miss looks like a missing post — no existence leak.
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let deleted = service.delete_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub message: String,
    pub liked: bool,
}

pub async fn toggle_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());

    let exists = service.post_exists(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to look up post");
        AppError::internal("failed to look up post")
    })?;
    if !exists {
        return Err(AppError::not_found("post not found"));
    }

    let liked = service.toggle_like(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to toggle like");
        AppError::internal("failed to toggle like")
    })?;

    let message = if liked { "Post liked!" } else { "Post unliked!" };
    Ok(Json(LikeResponse {
        message: message.to_string(),
        liked,
    }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub message: String,
    #[serde(flatten)]
    pub comment: crate::domain::engagement::Comment,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());

    let exists = service.post_exists(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to look up post");
        AppError::internal("failed to look up post")
    })?;
    if !exists {
        return Err(AppError::not_found("post not found"));
    }

    if payload.text.trim().is_empty() {
        return Err(AppError::bad_request("comment text cannot be empty"));
    }
    if payload.text.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment text exceeds 1000 characters"));
    }

    let comment = service
        .add_comment(id, auth.user_id, payload.text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment");
            AppError::internal("failed to comment")
        })?;

    Ok(Json(CommentResponse {
        message: "Comment added!".to_string(),
        comment,
    }))
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::domain::engagement::Comment>>, AppError> {
    let service = EngagementService::new(state.db.clone());

    let exists = service.post_exists(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to look up post");
        AppError::internal("failed to look up post")
    })?;
    if !exists {
        return Err(AppError::not_found("post not found"));
    }

    let comments = service.list_comments(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to list comments");
        AppError::internal("failed to list comments")
    })?;

    Ok(Json(comments))
}

pub async fn get_media(
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::media::Media>, AppError> {
    let service = MediaService::new(
        state.db.clone(),
        state.storage.clone(),
        state.s3_public_endpoint.clone(),
    );
    let media = service.get_media(id).await.map_err(|err| {
        tracing::error!(error = ?err, media_id = %id, "failed to fetch media");
        AppError::internal("failed to fetch media")
    })?;

    match media {
        Some(media) => Ok(Json(media)),
        None => Err(AppError::not_found("media not found")),
    }
}

#[derive(Deserialize)]
pub struct UploadRequest {
    pub kind: MediaKind,
    pub content_type: String,
    pub bytes: i64,
}

pub async fn create_upload(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadIntent>, AppError> {
    if payload.bytes <= 0 {
        return Err(AppError::bad_request("bytes must be greater than 0"));
    }
    if payload.bytes > state.upload_max_bytes {
        return Err(AppError::bad_request("upload exceeds max size"));
    }

    let service = MediaService::new(
        state.db.clone(),
        state.storage.clone(),
        state.s3_public_endpoint.clone(),
    );
    let intent = service
        .create_upload(
            auth.user_id,
            payload.kind,
            payload.content_type,
            payload.bytes,
            state.upload_url_ttl_seconds,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create upload");
            AppError::bad_request("invalid upload request")
        })?;

    Ok(Json(intent))
}
