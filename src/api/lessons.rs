use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::{OptionalAuth, RequireAuth};
use super::pagination::Paginated;
use super::types::{LessonDto, LessonRequest, PageQuery};
use super::validation::{
    TITLE_MAX_LEN, optional_text, page_request, required, required_text, video_link,
};
use super::{ApiError, AppState};
use crate::config::ContentConfig;
use crate::db::{LessonChanges, NewLesson};
use crate::domain::{Action, FieldErrors};
use crate::services::LessonError;

impl From<LessonError> for ApiError {
    fn from(err: LessonError) -> Self {
        match err {
            LessonError::NotFound(_) => Self::not_found(),
            LessonError::Forbidden => Self::forbidden(),
            LessonError::Validation(errors) => Self::Validation(errors),
            LessonError::Database(msg) => Self::DatabaseError(msg),
            LessonError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

fn parse_changes(
    payload: LessonRequest,
    partial: bool,
    content: &ContentConfig,
) -> Result<LessonChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let preview = payload
        .preview
        .map(|p| if p.trim().is_empty() { None } else { Some(p) });

    let changes = if partial {
        LessonChanges {
            title: optional_text(&mut errors, "title", payload.title, Some(TITLE_MAX_LEN)),
            description: optional_text(&mut errors, "description", payload.description, None),
            preview,
            link_to_video: video_link(&mut errors, payload.link_to_video, false, content),
            course_id: payload.course,
        }
    } else {
        LessonChanges {
            title: required_text(&mut errors, "title", payload.title, TITLE_MAX_LEN),
            description: required(&mut errors, "description", payload.description),
            preview: Some(preview.flatten()),
            link_to_video: video_link(&mut errors, payload.link_to_video, true, content),
            course_id: Some(payload.course.flatten()),
        }
    };

    errors.into_result()?;
    Ok(changes)
}

/// GET /lessons/
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    OptionalAuth(caller): OptionalAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<LessonDto>>, ApiError> {
    let request = page_request(
        query.page.as_deref(),
        query.page_size.as_deref(),
        &state.config().content,
    )?;

    let page = state
        .lesson_service()
        .list(caller.as_ref(), request)
        .await?;

    Ok(Json(Paginated::from_page(page, "/lessons/")?))
}

/// POST /lessons/
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    payload: Result<Json<LessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, false, &state.config().content)?;

    let input = NewLesson {
        title: changes.title.unwrap_or_default(),
        description: changes.description.unwrap_or_default(),
        preview: changes.preview.flatten(),
        link_to_video: changes.link_to_video.unwrap_or_default(),
        course_id: changes.course_id.flatten(),
    };

    let lesson = state.lesson_service().create(&caller, input).await?;

    Ok((StatusCode::CREATED, Json(LessonDto::from(lesson))))
}

/// GET /lessons/{id}/
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<LessonDto>, ApiError> {
    let lesson = state.lesson_service().get(&caller, id).await?;
    Ok(Json(lesson.into()))
}

/// PUT /lessons/{id}/
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
    payload: Result<Json<LessonRequest>, JsonRejection>,
) -> Result<Json<LessonDto>, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, false, &state.config().content)?;

    let lesson = state
        .lesson_service()
        .update(&caller, id, changes, Action::Update)
        .await?;

    Ok(Json(lesson.into()))
}

/// PATCH /lessons/{id}/
pub async fn patch_lesson(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
    payload: Result<Json<LessonRequest>, JsonRejection>,
) -> Result<Json<LessonDto>, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, true, &state.config().content)?;

    let lesson = state
        .lesson_service()
        .update(&caller, id, changes, Action::PartialUpdate)
        .await?;

    Ok(Json(lesson.into()))
}

/// DELETE /lessons/{id}/
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.lesson_service().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
