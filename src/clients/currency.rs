use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::CurrencyConfig;

/// Source of the RUB/USD exchange rate.
#[async_trait::async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// How many roubles one US dollar costs.
    async fn rub_per_usd(&self) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    data: LatestData,
}

#[derive(Debug, Deserialize)]
struct LatestData {
    #[serde(rename = "RUB")]
    rub: CurrencyValue,
}

#[derive(Debug, Deserialize)]
struct CurrencyValue {
    value: f64,
}

/// Client for the currencyapi.com `latest` endpoint.
#[derive(Clone)]
pub struct CurrencyApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CurrencyApiClient {
    pub fn new(config: &CurrencyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("lms/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build currency HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ExchangeRateProvider for CurrencyApiClient {
    async fn rub_per_usd(&self) -> Result<f64> {
        let mut url = Url::parse(&format!("{}/v3/latest", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("currencies", "RUB");

        debug!("Fetching RUB exchange rate");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Currency API returned {status}");
        }

        let body: LatestResponse = response
            .json()
            .await
            .context("Failed to parse currency API response")?;

        let rate = body.data.rub.value;
        if !(rate.is_finite() && rate > 0.0) {
            anyhow::bail!("Currency API returned an unusable rate: {rate}");
        }

        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String) -> CurrencyApiClient {
        CurrencyApiClient::new(&CurrencyConfig {
            api_url: base_url,
            api_key: "test".to_string(),
            fallback_rate: 90.0,
            request_timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_reads_rub_value() {
        let router = Router::new().route(
            "/v3/latest",
            get(|| async {
                Json(serde_json::json!({
                    "meta": { "last_updated_at": "2026-01-01T00:00:00Z" },
                    "data": { "RUB": { "code": "RUB", "value": 80.5 } }
                }))
            }),
        );
        let client = client_for(serve(router).await);

        let rate = client.rub_per_usd().await.unwrap();
        assert!((rate - 80.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let router = Router::new().route(
            "/v3/latest",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let client = client_for(serve(router).await);

        assert!(client.rub_per_usd().await.is_err());
    }
}
