//! `SeaORM` implementation of the `PaymentService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::currency::ExchangeRateProvider;
use crate::clients::stripe::{CheckoutSession, PaymentProvider};
use crate::config::{CurrencyConfig, StripeConfig};
use crate::db::{NewPayment, PaymentFilter, Store};
use crate::domain::{Caller, FieldErrors};
use crate::entities::payments;
use crate::services::payment_service::{
    CreatePayment, PaymentError, PaymentService, rub_to_usd_cents,
};

pub struct SeaOrmPaymentService {
    store: Store,
    rates: Arc<dyn ExchangeRateProvider>,
    provider: Arc<dyn PaymentProvider>,
    fallback_rate: f64,
    currency: String,
    success_url: String,
}

impl SeaOrmPaymentService {
    #[must_use]
    pub fn new(
        store: Store,
        rates: Arc<dyn ExchangeRateProvider>,
        provider: Arc<dyn PaymentProvider>,
        currency: &CurrencyConfig,
        stripe: &StripeConfig,
    ) -> Self {
        Self {
            store,
            rates,
            provider,
            fallback_rate: currency.fallback_rate,
            currency: stripe.currency.clone(),
            success_url: stripe.success_url.clone(),
        }
    }

    /// Live RUB/USD rate, or the configured fallback when the lookup fails.
    async fn resolve_rate(&self) -> f64 {
        match self.rates.rub_per_usd().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(
                    error = %e,
                    fallback_rate = self.fallback_rate,
                    "Exchange rate lookup failed, using fallback rate"
                );
                self.fallback_rate
            }
        }
    }

    async fn validate(&self, input: &CreatePayment) -> Result<(), PaymentError> {
        let mut errors = FieldErrors::new();

        if !self.store.course_exists(input.course_id).await? {
            errors.add(
                "course",
                format!("Invalid pk \"{}\" - object does not exist.", input.course_id),
            );
        }
        if let Some(lesson_id) = input.lesson_id
            && !self.store.lesson_exists(lesson_id).await?
        {
            errors.add(
                "lesson",
                format!("Invalid pk \"{lesson_id}\" - object does not exist."),
            );
        }

        errors.into_result().map_err(PaymentError::Validation)
    }

    async fn insert(
        &self,
        caller: &Caller,
        input: &CreatePayment,
    ) -> Result<payments::Model, PaymentError> {
        let new = NewPayment {
            user_id: caller.user_id,
            course_id: Some(input.course_id),
            lesson_id: input.lesson_id,
            amount: input.amount,
            payment_method: input.payment_method,
            idempotency_key: input.idempotency_key.clone(),
        };

        match self.store.create_payment(new).await {
            Ok(payment) => Ok(payment),
            Err(e) => {
                // A concurrent request with the same key won the insert.
                if let Some(key) = &input.idempotency_key
                    && let Some(existing) = self
                        .store
                        .find_payment_by_idempotency_key(caller.user_id, key)
                        .await?
                {
                    return replay(existing);
                }
                Err(e.into())
            }
        }
    }

    async fn open_session(
        &self,
        payment_id: i32,
        product_name: &str,
        unit_amount: i64,
    ) -> anyhow::Result<CheckoutSession> {
        let key = format!("lms-payment-{payment_id}");

        let product_id = self
            .provider
            .create_product(product_name, &format!("{key}-product"))
            .await?;
        let price_id = self
            .provider
            .create_price(
                &product_id,
                unit_amount,
                &self.currency,
                &format!("{key}-price"),
            )
            .await?;

        self.provider
            .create_checkout_session(&price_id, &self.success_url, &format!("{key}-session"))
            .await
    }

    async fn discard(&self, payment_id: i32) {
        if let Err(e) = self.store.delete_payment(payment_id).await {
            error!(payment_id, error = %e, "Failed to discard unusable payment");
        }
    }
}

/// Payment stored under a repeated idempotency key. Without a session the
/// first request has not finished.
fn replay(existing: payments::Model) -> Result<payments::Model, PaymentError> {
    if existing.session_id.is_none() {
        return Err(PaymentError::InProgress(existing.id));
    }
    Ok(existing)
}

#[async_trait]
impl PaymentService for SeaOrmPaymentService {
    async fn create(
        &self,
        caller: &Caller,
        input: CreatePayment,
    ) -> Result<payments::Model, PaymentError> {
        if let Some(key) = &input.idempotency_key
            && let Some(existing) = self
                .store
                .find_payment_by_idempotency_key(caller.user_id, key)
                .await?
        {
            info!(payment_id = existing.id, "Returning payment for repeated idempotency key");
            return replay(existing);
        }

        self.validate(&input).await?;

        let payment = self.insert(caller, &input).await?;
        if payment.session_id.is_some() {
            return Ok(payment);
        }

        let rate = self.resolve_rate().await;
        let cents = rub_to_usd_cents(payment.amount, rate);
        if cents < 1 {
            self.discard(payment.id).await;
            return Err(PaymentError::Validation(FieldErrors::single(
                "amount",
                "Amount is too small to be charged.",
            )));
        }

        let product_name = match self.store.get_course(input.course_id).await? {
            Some(course) => course.title,
            None => format!("Course {}", input.course_id),
        };

        let session = match self.open_session(payment.id, &product_name, cents).await {
            Ok(session) => session,
            Err(e) => {
                error!(payment_id = payment.id, error = %e, "Checkout session creation failed");
                self.discard(payment.id).await;
                return Err(PaymentError::Provider(e.to_string()));
            }
        };

        let payment = self
            .store
            .attach_payment_session(payment.id, &session.id, &session.url)
            .await?
            .ok_or(PaymentError::NotFound(payment.id))?;

        metrics::counter!("payments_created_total", "method" => input.payment_method.as_str())
            .increment(1);
        info!(
            payment_id = payment.id,
            user_id = caller.user_id,
            amount_rub = payment.amount,
            amount_usd_cents = cents,
            rate,
            "Payment created"
        );

        Ok(payment)
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: PaymentFilter,
    ) -> Result<Vec<payments::Model>, PaymentError> {
        Ok(self
            .store
            .list_payments(caller.visibility(), &filter)
            .await?)
    }

    async fn get(&self, caller: &Caller, id: i32) -> Result<payments::Model, PaymentError> {
        self.store
            .get_payment(id)
            .await?
            .filter(|p| caller.visibility().can_see(p.user_id))
            .ok_or(PaymentError::NotFound(id))
    }
}
