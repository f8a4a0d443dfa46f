use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::http::AppError;
use crate::AppState;

/// Guard for handlers that require an authenticated caller. Extraction
/// fails with 401 when no valid bearer token is presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

/// Guard for handlers that require an anonymous caller (register, login).
/// A request carrying a *valid* access token is rejected; requests with no
/// or unusable credentials pass through.
#[derive(Debug, Clone)]
pub struct Guest;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
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

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let session = auth_service(state)
            .authenticate_access_token(token)
            .await
            .map_err(|_| AppError::internal("failed to authenticate"))?;

        let session = session.ok_or_else(|| AppError::unauthorized("invalid token"))?;
        Ok(AuthUser {
            user_id: session.user_id,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Guest {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Guest);
        };

        let session = auth_service(state)
            .authenticate_access_token(token)
            .await
            .map_err(|_| AppError::internal("failed to authenticate"))?;

        if session.is_some() {
            return Err(AppError::conflict("already authenticated"));
        }

        Ok(Guest)
    }
}
