use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::StripeConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Remote catalogue and checkout operations needed to sell a course.
///
/// Every call carries an idempotency key so a retried request never creates
/// a second remote object.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_product(&self, name: &str, idempotency_key: &str) -> Result<String>;

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        success_url: &str,
        idempotency_key: &str,
    ) -> Result<CheckoutSession>;
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Form-encoded client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("lms/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Stripe HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: &str,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(path, "Calling Stripe");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await
            .with_context(|| format!("Stripe request to {path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(text);
            anyhow::bail!("Stripe API error ({status}): {message}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Stripe response from {path}"))
    }
}

#[async_trait::async_trait]
impl PaymentProvider for StripeClient {
    async fn create_product(&self, name: &str, idempotency_key: &str) -> Result<String> {
        let product: StripeObject = self
            .post_form("/v1/products", &[("name", name.to_string())], idempotency_key)
            .await?;
        Ok(product.id)
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<String> {
        let params = [
            ("currency", currency.to_string()),
            ("unit_amount", unit_amount.to_string()),
            ("product", product_id.to_string()),
        ];
        let price: StripeObject = self
            .post_form("/v1/prices", &params, idempotency_key)
            .await?;
        Ok(price.id)
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        success_url: &str,
        idempotency_key: &str,
    ) -> Result<CheckoutSession> {
        let params = [
            ("mode", "payment".to_string()),
            ("success_url", success_url.to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
        ];
        let session: StripeCheckoutSession = self
            .post_form("/v1/checkout/sessions", &params, idempotency_key)
            .await?;

        let url = session
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe checkout session {} has no URL", session.id))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
