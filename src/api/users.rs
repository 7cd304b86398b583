use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::RequireAuth;
use super::types::{PublicUserDto, RegisterRequest, UserDto, UserUpdateRequest};
use super::validation::{optional_text, required, validate_email, validate_password};
use super::{ApiError, AppState};
use crate::db::{NewUser, UserChanges};
use crate::domain::FieldErrors;
use crate::services::UserError;

const NAME_MAX_LEN: usize = 150;

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => Self::not_found(),
            UserError::Forbidden => Self::forbidden(),
            UserError::Validation(errors) => Self::Validation(errors),
            UserError::Database(msg) => Self::DatabaseError(msg),
            UserError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_registration(payload: RegisterRequest) -> Result<NewUser, ApiError> {
    let mut errors = FieldErrors::new();

    let email = required(&mut errors, "email", payload.email).map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        validate_email(&mut errors, email);
    }
    let password = required(&mut errors, "password", payload.password);
    if let Some(password) = &password {
        validate_password(&mut errors, password);
    }

    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Validation(errors));
    };
    errors.into_result()?;

    Ok(NewUser {
        email,
        password,
        first_name: payload.first_name.unwrap_or_default(),
        last_name: payload.last_name.unwrap_or_default(),
        phone: blank_to_none(payload.phone),
        city: blank_to_none(payload.city),
    })
}

fn parse_changes(payload: UserUpdateRequest) -> Result<UserChanges, ApiError> {
    let mut errors = FieldErrors::new();

    let email = optional_text(&mut errors, "email", payload.email, None)
        .map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        validate_email(&mut errors, email);
    }
    let password = payload.password;
    if let Some(password) = &password {
        validate_password(&mut errors, password);
    }
    let first_name = payload.first_name;
    let last_name = payload.last_name;
    for (field, value) in [("first_name", &first_name), ("last_name", &last_name)] {
        if value.as_ref().is_some_and(|v| v.chars().count() > NAME_MAX_LEN) {
            errors.add(
                field,
                format!("Ensure this field has no more than {NAME_MAX_LEN} characters."),
            );
        }
    }

    errors.into_result()?;

    Ok(UserChanges {
        email,
        password,
        first_name,
        last_name,
        phone: payload.phone.map(|p| blank_to_none(Some(p))),
        city: payload.city.map(|c| blank_to_none(Some(c))),
    })
}

/// POST /users/register/
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let input = parse_registration(payload)?;

    let user = state.user_service().register(input).await?;

    Ok((StatusCode::CREATED, Json(UserDto::full(user, Vec::new()))))
}

/// GET /users/
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    RequireAuth(_caller): RequireAuth,
) -> Result<Json<Vec<PublicUserDto>>, ApiError> {
    let users = state.user_service().list().await?;
    Ok(Json(users.into_iter().map(PublicUserDto::from).collect()))
}

/// GET /users/{id}/
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<UserDto>, ApiError> {
    let profile = state.user_service().get(&caller, id).await?;
    Ok(Json(profile.into()))
}

/// PUT/PATCH /users/{id}/
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
    payload: Result<Json<UserUpdateRequest>, JsonRejection>,
) -> Result<Json<UserDto>, ApiError> {
    let Json(payload) = payload?;
    let changes = parse_changes(payload)?;

    let profile = state.user_service().update(&caller, id, changes).await?;
    Ok(Json(profile.into()))
}

/// DELETE /users/{id}/
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.user_service().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_normalises_email() {
        let user = parse_registration(RegisterRequest {
            email: Some(" Alice@Example.COM ".into()),
            password: Some("password123".into()),
            phone: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.phone, None);
    }

    #[test]
    fn test_registration_requires_credentials() {
        let err = parse_registration(RegisterRequest::default()).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_update_clears_phone_with_empty_string() {
        let changes = parse_changes(UserUpdateRequest {
            phone: Some(String::new()),
            city: Some("Moscow".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(changes.phone, Some(None));
        assert_eq!(changes.city, Some(Some("Moscow".to_string())));
        assert!(changes.email.is_none());
    }
}
