use axum::{
    Json,
    extract::{FromRequestParts, Request, State, rejection::JsonRejection},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::types::{AccessTokenResponse, LoginRequest, RefreshRequest};
use super::validation::required;
use super::{ApiError, AppState};
use crate::domain::{Caller, FieldErrors};
use crate::services::{AuthError, TokenPair};

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InactiveUser => {
                Self::Unauthorized(AuthError::InvalidCredentials.to_string())
            }
            AuthError::InvalidToken(_) => Self::Unauthorized("Token is invalid or expired".into()),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <access token>` into a [`Caller`] stored
/// in the request extensions. The caller is also attached to the response so
/// outer layers can log who made the request.
///
/// Requests without the header pass through anonymously; handlers decide
/// with [`RequireAuth`] or [`OptionalAuth`]. A header carrying a bad token
/// is rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(&headers) else {
        return next.run(request).await;
    };

    match state.auth_service().authenticate(&token).await {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            let mut response = next.run(request).await;
            // Read back by the request logging middleware
            response.extensions_mut().insert(caller);
            response
        }
        Err(AuthError::Database(msg)) => ApiError::DatabaseError(msg).into_response(),
        Err(AuthError::Internal(msg)) => ApiError::InternalError(msg).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::invalid_token().into_response()
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated caller; 401 when the request is anonymous.
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth(pub Caller);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .copied()
            .map(Self)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// Caller if a valid token was sent.
#[derive(Debug, Clone, Copy)]
pub struct OptionalAuth(pub Option<Caller>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Caller>().copied()))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /users/login/
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(payload) = payload?;

    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", payload.email);
    let password = required(&mut errors, "password", payload.password);
    errors.into_result()?;

    let pair = state
        .auth_service()
        .login(&email.unwrap_or_default(), &password.unwrap_or_default())
        .await?;

    Ok(Json(pair))
}

/// POST /users/token/refresh/
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let mut errors = FieldErrors::new();
    let token = required(&mut errors, "refresh", payload.refresh);
    errors.into_result()?;

    let access = state
        .auth_service()
        .refresh(&token.unwrap_or_default())
        .await?;

    Ok(Json(AccessTokenResponse { access }))
}
