use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use super::auth::RequireAuth;
use super::types::{MessageResponse, SubscriptionRequest};
use super::{ApiError, AppState};
use crate::services::SubscriptionError;

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::CourseNotFound(_) => Self::not_found(),
            SubscriptionError::Database(msg) => Self::DatabaseError(msg),
            SubscriptionError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

/// POST /subs/
///
/// Toggles the caller's subscription to `course_id`.
pub async fn toggle_subscription(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    payload: Result<Json<SubscriptionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    let course_id = payload
        .course_id
        .ok_or_else(|| ApiError::field("course_id", "This field is required."))?;

    let outcome = state
        .subscription_service()
        .toggle(&caller, course_id)
        .await?;

    Ok(Json(MessageResponse {
        message: outcome.message().to_string(),
    }))
}
