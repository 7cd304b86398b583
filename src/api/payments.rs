use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::RequireAuth;
use super::types::{PaymentDto, PaymentQuery, PaymentRequest};
use super::validation::validate_positive_amount;
use super::{ApiError, AppState};
use crate::db::{PaymentFilter, PaymentOrdering};
use crate::domain::{FieldErrors, PaymentMethod};
use crate::services::{CreatePayment, PaymentError};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const IDEMPOTENCY_KEY_MAX_LEN: usize = 255;

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound(_) => Self::not_found(),
            PaymentError::Validation(errors) => Self::Validation(errors),
            PaymentError::InProgress(_) => Self::Conflict(
                "A payment with this Idempotency-Key is still being processed".into(),
            ),
            PaymentError::Provider(msg) => Self::stripe_error(msg),
            PaymentError::Database(msg) => Self::DatabaseError(msg),
            PaymentError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be visible ASCII".into()))?
        .trim();

    if key.is_empty() || key.len() > IDEMPOTENCY_KEY_MAX_LEN {
        return Err(ApiError::BadRequest(format!(
            "Idempotency-Key must be 1 to {IDEMPOTENCY_KEY_MAX_LEN} characters"
        )));
    }

    Ok(Some(key.to_string()))
}

fn parse_method(errors: &mut FieldErrors, raw: Option<&str>) -> Option<PaymentMethod> {
    let Some(raw) = raw else {
        errors.add("payment_method", "This field is required.");
        return None;
    };
    raw.parse()
        .map_err(|message: String| errors.add("payment_method", message))
        .ok()
}

fn parse_create(payload: PaymentRequest, key: Option<String>) -> Result<CreatePayment, ApiError> {
    let mut errors = FieldErrors::new();

    if payload.course.is_none() {
        errors.add("course", "This field is required.");
    }
    let amount = validate_positive_amount(&mut errors, payload.amount);
    let method = parse_method(&mut errors, payload.payment_method.as_deref());

    let (Some(course_id), Some(amount), Some(payment_method)) = (payload.course, amount, method)
    else {
        return Err(ApiError::Validation(errors));
    };

    Ok(CreatePayment {
        course_id,
        lesson_id: payload.lesson,
        amount,
        payment_method,
        idempotency_key: key,
    })
}

fn parse_filter(query: PaymentQuery) -> Result<PaymentFilter, ApiError> {
    let mut errors = FieldErrors::new();

    let payment_method = match query.payment_method.as_deref() {
        None | Some("") => None,
        Some(raw) => parse_method(&mut errors, Some(raw)),
    };

    let ordering = match query.ordering.as_deref() {
        None | Some("" | "-payment_date") => PaymentOrdering::DateDesc,
        Some("payment_date") => PaymentOrdering::DateAsc,
        Some(other) => {
            errors.add(
                "ordering",
                format!("\"{other}\" is not a valid ordering."),
            );
            PaymentOrdering::default()
        }
    };

    errors.into_result()?;

    Ok(PaymentFilter {
        course_id: query.course,
        lesson_id: query.lesson,
        payment_method,
        ordering,
    })
}

/// POST /payment/
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    headers: HeaderMap,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let key = idempotency_key(&headers)?;
    let Json(payload) = payload?;
    let input = parse_create(payload, key)?;

    let payment = state.payment_service().create(&caller, input).await?;

    Ok((StatusCode::CREATED, Json(PaymentDto::from(payment))))
}

/// GET /payments/
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Vec<PaymentDto>>, ApiError> {
    let filter = parse_filter(query)?;
    let payments = state.payment_service().list(&caller, filter).await?;

    Ok(Json(payments.into_iter().map(PaymentDto::from).collect()))
}

/// GET /payments/{id}/
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<PaymentDto>, ApiError> {
    let payment = state.payment_service().get(&caller, id).await?;
    Ok(Json(payment.into()))
}
