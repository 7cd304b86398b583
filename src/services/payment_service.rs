//! Domain service for payments and checkout sessions.

use thiserror::Error;

use crate::db::PaymentFilter;
use crate::domain::{Caller, FieldErrors, PaymentMethod};
use crate::entities::payments;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment {0} not found")]
    NotFound(i32),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The idempotency key belongs to a payment whose checkout is still being opened.
    #[error("Payment {0} is still being processed")]
    InProgress(i32),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for PaymentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for PaymentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Request to pay for a course (and optionally one of its lessons).
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub course_id: i32,
    pub lesson_id: Option<i32>,
    /// Amount in roubles
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub idempotency_key: Option<String>,
}

/// Converts a rouble amount to whole US cents, rounding down.
#[must_use]
pub fn rub_to_usd_cents(amount_rub: i64, rub_per_usd: f64) -> i64 {
    if rub_per_usd <= 0.0 || !rub_per_usd.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let cents = (amount_rub as f64 * 100.0 / rub_per_usd).floor() as i64;
    cents
}

#[async_trait::async_trait]
pub trait PaymentService: Send + Sync {
    /// Stores the payment and opens a checkout session for it.
    ///
    /// A repeated call with the same idempotency key returns the stored
    /// payment without contacting the provider again, or fails with
    /// [`PaymentError::InProgress`] while the first call has no session yet.
    async fn create(
        &self,
        caller: &Caller,
        input: CreatePayment,
    ) -> Result<payments::Model, PaymentError>;

    async fn list(
        &self,
        caller: &Caller,
        filter: PaymentFilter,
    ) -> Result<Vec<payments::Model>, PaymentError>;

    async fn get(&self, caller: &Caller, id: i32) -> Result<payments::Model, PaymentError>;
}
