use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::{OptionalAuth, RequireAuth};
use super::pagination::Paginated;
use super::types::{CourseDto, CourseRequest, PageQuery};
use super::validation::{TITLE_MAX_LEN, optional_text, page_request, required, required_text};
use super::{ApiError, AppState};
use crate::db::{CourseChanges, NewCourse};
use crate::domain::{Action, FieldErrors};
use crate::services::CourseError;

impl From<CourseError> for ApiError {
    fn from(err: CourseError) -> Self {
        match err {
            CourseError::NotFound(_) => Self::not_found(),
            CourseError::Forbidden => Self::forbidden(),
            CourseError::Database(msg) => Self::DatabaseError(msg),
            CourseError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

fn preview_change(preview: Option<String>) -> Option<Option<String>> {
    preview.map(|p| if p.trim().is_empty() { None } else { Some(p) })
}

fn parse_changes(payload: CourseRequest, partial: bool) -> Result<CourseChanges, ApiError> {
    let mut errors = FieldErrors::new();

    let changes = if partial {
        CourseChanges {
            title: optional_text(&mut errors, "title", payload.title, Some(TITLE_MAX_LEN)),
            description: optional_text(&mut errors, "description", payload.description, None),
            preview: preview_change(payload.preview),
        }
    } else {
        CourseChanges {
            title: required_text(&mut errors, "title", payload.title, TITLE_MAX_LEN),
            description: required(&mut errors, "description", payload.description),
            preview: Some(preview_change(payload.preview).flatten()),
        }
    };

    errors.into_result()?;
    Ok(changes)
}

/// GET /courses/
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    OptionalAuth(caller): OptionalAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CourseDto>>, ApiError> {
    let request = page_request(
        query.page.as_deref(),
        query.page_size.as_deref(),
        &state.config().content,
    )?;

    let page = state
        .course_service()
        .list(caller.as_ref(), request)
        .await?;

    Ok(Json(Paginated::from_page(page, "/courses/")?))
}

/// POST /courses/
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, false)?;

    let input = NewCourse {
        title: changes.title.unwrap_or_default(),
        description: changes.description.unwrap_or_default(),
        preview: changes.preview.flatten(),
    };

    let course = state.course_service().create(&caller, input).await?;

    Ok((StatusCode::CREATED, Json(CourseDto::from(course))))
}

/// GET /courses/{id}/
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<CourseDto>, ApiError> {
    let course = state.course_service().get(&caller, id).await?;
    Ok(Json(course.into()))
}

/// PUT /courses/{id}/
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<Json<CourseDto>, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, false)?;

    let course = state
        .course_service()
        .update(&caller, id, changes, Action::Update)
        .await?;

    Ok(Json(course.into()))
}

/// PATCH /courses/{id}/
pub async fn patch_course(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<Json<CourseDto>, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload, true)?;

    let course = state
        .course_service()
        .update(&caller, id, changes, Action::PartialUpdate)
        .await?;

    Ok(Json(course.into()))
}

/// DELETE /courses/{id}/
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.course_service().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_update_requires_fields() {
        let err = parse_changes(CourseRequest::default(), false).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("title").is_some());
        assert!(errors.get("description").is_some());
    }

    #[test]
    fn test_partial_update_keeps_absent_fields() {
        let changes = parse_changes(
            CourseRequest {
                title: Some("New".into()),
                ..Default::default()
            },
            true,
        )
        .unwrap();
        assert_eq!(changes.title.as_deref(), Some("New"));
        assert!(changes.description.is_none());
        assert!(changes.preview.is_none());
    }

    #[test]
    fn test_empty_preview_clears() {
        let changes = parse_changes(
            CourseRequest {
                preview: Some(String::new()),
                ..Default::default()
            },
            true,
        )
        .unwrap();
        assert_eq!(changes.preview, Some(None));
    }
}
