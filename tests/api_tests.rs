use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use lms::clients::currency::ExchangeRateProvider;
use lms::clients::mailer::{EmailMessage, Mailer};
use lms::clients::stripe::{CheckoutSession, PaymentProvider};
use lms::config::Config;
use lms::db::{MODERATOR_GROUP, NewPayment};
use lms::domain::PaymentMethod;
use lms::state::{ExternalClients, SharedState};

struct FixedRate(Option<f64>);

#[async_trait::async_trait]
impl ExchangeRateProvider for FixedRate {
    async fn rub_per_usd(&self) -> anyhow::Result<f64> {
        self.0
            .ok_or_else(|| anyhow::anyhow!("exchange rate service unreachable"))
    }
}

#[derive(Default)]
struct FakeStripe {
    fail: bool,
    calls: AtomicUsize,
    unit_amounts: Mutex<Vec<i64>>,
}

#[async_trait::async_trait]
impl PaymentProvider for FakeStripe {
    async fn create_product(&self, name: &str, _idempotency_key: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("Invalid API Key provided");
        }
        Ok(format!("prod_{}", name.len()))
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        _currency: &str,
        _idempotency_key: &str,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.unit_amounts.lock().unwrap().push(unit_amount);
        Ok(format!("price_{product_id}"))
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        _success_url: &str,
        _idempotency_key: &str,
    ) -> anyhow::Result<CheckoutSession> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutSession {
            id: format!("cs_{price_id}"),
            url: format!("https://checkout.stripe.test/{price_id}"),
        })
    }
}

#[derive(Default)]
struct FakeMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl FakeMailer {
    fn recipients(&self) -> Vec<String> {
        let mut to: Vec<String> = self.sent.lock().unwrap().iter().map(|m| m.to.clone()).collect();
        to.sort();
        to
    }
}

#[async_trait::async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    shared: Arc<SharedState>,
    stripe: Arc<FakeStripe>,
    mailer: Arc<FakeMailer>,
}

fn test_config() -> Config {
    let path = std::env::temp_dir().join(format!("lms-api-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", path.display());
    config.auth.jwt_secret = lms::config::generate_secret();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.tasks.retry_base_delay_ms = 5;
    config
}

async fn spawn_app_with(rate: Option<f64>, stripe: FakeStripe) -> TestApp {
    let stripe = Arc::new(stripe);
    let mailer = Arc::new(FakeMailer::default());

    let clients = ExternalClients {
        rates: Arc::new(FixedRate(rate)),
        payments: stripe.clone(),
        mailer: mailer.clone(),
    };

    let shared = Arc::new(
        SharedState::with_clients(test_config(), clients)
            .await
            .expect("Failed to create shared state"),
    );
    let router = lms::api::router(lms::api::create_app_state(shared.clone(), None));

    TestApp {
        router,
        shared,
        stripe,
        mailer,
    }
}

fn lesson_payload(title: &str, course_id: Option<i64>) -> Value {
    json!({
        "title": title,
        "description": "Watch and repeat",
        "link_to_video": "https://www.youtube.com/watch?v=abc",
        "course": course_id,
    })
}

async fn spawn_app() -> TestApp {
    spawn_app_with(Some(90.0), FakeStripe::default()).await
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.call_with_headers(method, uri, token, &[], body).await
    }

    async fn call_with_headers(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    /// Registers a user and returns `(id, access token)`.
    async fn user(&self, email: &str) -> (i32, String) {
        let (status, body) = self
            .call(
                "POST",
                "/users/register/",
                None,
                Some(json!({"email": email, "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = i32::try_from(body["id"].as_i64().unwrap()).unwrap();

        let (access, _) = self.login(email).await;
        (id, access)
    }

    async fn moderator(&self, email: &str) -> (i32, String) {
        let (id, _) = self.user(email).await;
        self.shared
            .store
            .add_user_to_group(id, MODERATOR_GROUP)
            .await
            .unwrap();
        let (access, _) = self.login(email).await;
        (id, access)
    }

    async fn login(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/users/login/",
                None,
                Some(json!({"email": email, "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["access"].as_str().unwrap().to_string(),
            body["refresh"].as_str().unwrap().to_string(),
        )
    }

    async fn lesson(&self, token: &str, course_id: Option<i64>) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/lessons/",
                Some(token),
                Some(lesson_payload("Intro", course_id)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn course(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/courses/",
                Some(token),
                Some(json!({"title": title, "description": "About it"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;

    let (status, body) = app.call("GET", "/health/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_course_lessons_count() {
    let app = spawn_app().await;
    let (owner_id, token) = app.user("owner@example.com").await;
    let course_id = app.course(&token, "Rust").await;

    for title in ["Intro", "Ownership"] {
        let (status, body) = app
            .call(
                "POST",
                "/lessons/",
                Some(&token),
                Some(json!({
                    "title": title,
                    "description": "Watch and repeat",
                    "link_to_video": "https://www.youtube.com/watch?v=abc",
                    "course": course_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["owner"], owner_id);
    }

    let (status, body) = app
        .call("GET", &format!("/courses/{course_id}/"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lessons_count"], 2);
    assert_eq!(body["lessons"].as_array().unwrap().len(), 2);
    assert_eq!(body["is_subscribed"], false);

    let (status, body) = app.call("GET", "/courses/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["lessons_count"], 2);
}

#[tokio::test]
async fn test_anonymous_course_list_is_empty() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner@example.com").await;
    app.course(&token, "Rust").await;

    let (status, body) = app.call("GET", "/courses/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert!(body["results"].as_array().unwrap().is_empty());

    let (status, _) = app
        .call("POST", "/courses/", None, Some(json!({"title": "Nope"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_course_pagination_links() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner@example.com").await;
    for i in 0..3 {
        app.course(&token, &format!("Course {i}")).await;
    }

    let (status, body) = app
        .call("GET", "/courses/?page=1&page_size=2", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert!(body["next"].as_str().unwrap().contains("page=2"));
    assert!(body["previous"].is_null());

    let (status, _) = app
        .call("GET", "/courses/?page=9", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_moderator_permissions() {
    let app = spawn_app().await;
    let (_, owner) = app.user("owner@example.com").await;
    let (_, moderator) = app.moderator("mod@example.com").await;
    let course_id = app.course(&owner, "Rust").await;
    let uri = format!("/courses/{course_id}/");

    let (status, _) = app.call("GET", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            "PATCH",
            &uri,
            Some(&moderator),
            Some(json!({"description": "Reviewed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["description"], "Reviewed");
    assert_eq!(body["title"], "Rust");

    let (status, _) = app
        .call(
            "POST",
            "/courses/",
            Some(&moderator),
            Some(json!({"title": "Moderated", "description": "Reviewed"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_other_users_course_is_hidden() {
    let app = spawn_app().await;
    let (_, owner) = app.user("owner@example.com").await;
    let (_, stranger) = app.user("stranger@example.com").await;
    let course_id = app.course(&owner, "Rust").await;
    let uri = format!("/courses/{course_id}/");

    let (status, body) = app.call("GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found.");

    let (status, _) = app
        .call(
            "PUT",
            &uri,
            Some(&stranger),
            Some(json!({"title": "Mine", "description": "Taken"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call("GET", "/courses/", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_anonymous_lesson_list_is_empty() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner@example.com").await;
    app.lesson(&token, None).await;

    let (status, body) = app.call("GET", "/lessons/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert!(body["results"].as_array().unwrap().is_empty());

    let (status, body) = app.call("GET", "/lessons/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_lesson_moderator_permissions() {
    let app = spawn_app().await;
    let (_, owner) = app.user("owner@example.com").await;
    let (_, moderator) = app.moderator("mod@example.com").await;
    let lesson_id = app.lesson(&owner, None).await;
    let uri = format!("/lessons/{lesson_id}/");

    let (status, body) = app.call("GET", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Intro");

    let (status, body) = app
        .call(
            "PATCH",
            &uri,
            Some(&moderator),
            Some(json!({"description": "Reviewed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["description"], "Reviewed");

    let (status, _) = app
        .call(
            "POST",
            "/lessons/",
            Some(&moderator),
            Some(lesson_payload("Moderated", None)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_other_users_lesson_is_hidden() {
    let app = spawn_app().await;
    let (_, owner) = app.user("owner@example.com").await;
    let (_, stranger) = app.user("stranger@example.com").await;
    let lesson_id = app.lesson(&owner, None).await;
    let uri = format!("/lessons/{lesson_id}/");

    let (status, body) = app.call("GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found.");

    let (status, _) = app.call("DELETE", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_lesson_course_can_be_cleared() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner@example.com").await;
    let course_id = app.course(&token, "Rust").await;
    let lesson_id = app.lesson(&token, Some(course_id)).await;
    let uri = format!("/lessons/{lesson_id}/");

    let (status, body) = app
        .call("PATCH", &uri, Some(&token), Some(json!({"title": "Renamed"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["course"], course_id);

    let (status, body) = app
        .call("PATCH", &uri, Some(&token), Some(json!({"course": null})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["course"].is_null());

    let (_, body) = app
        .call("GET", &format!("/courses/{course_id}/"), Some(&token), None)
        .await;
    assert_eq!(body["lessons_count"], 0);
}

#[tokio::test]
async fn test_lesson_video_link_must_match_host() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/lessons/",
            Some(&token),
            Some(json!({
                "title": "Elsewhere",
                "link_to_video": "https://vimeo.com/12345",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["link_to_video"][0],
        "Only links to youtube.com are allowed."
    );

    let (status, body) = app
        .call(
            "POST",
            "/lessons/",
            Some(&token),
            Some(json!({"title": "", "link_to_video": "https://youtube.com/watch?v=1"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("title").is_some());
}

#[tokio::test]
async fn test_subscription_toggle() {
    let app = spawn_app().await;
    let (_, token) = app.user("student@example.com").await;
    let course_id = app.course(&token, "Rust").await;

    let (status, body) = app
        .call(
            "POST",
            "/subs/",
            Some(&token),
            Some(json!({"course_id": course_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Подписка добавлена");

    let (_, body) = app
        .call("GET", &format!("/courses/{course_id}/"), Some(&token), None)
        .await;
    assert_eq!(body["is_subscribed"], true);

    let (status, body) = app
        .call(
            "POST",
            "/subs/",
            Some(&token),
            Some(json!({"course_id": course_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Подписка удалена");

    let (status, _) = app
        .call("POST", "/subs/", Some(&token), Some(json!({"course_id": 999})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_course_update_notifies_subscribers() {
    let app = spawn_app().await;
    let (_, owner) = app.user("owner@example.com").await;
    let (_, student) = app.user("student@example.com").await;
    let course_id = app.course(&owner, "Rust").await;

    // Only the owner can see the course, so the student subscribes by id.
    let (status, _) = app
        .call(
            "POST",
            "/subs/",
            Some(&student),
            Some(json!({"course_id": course_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            "PATCH",
            &format!("/courses/{course_id}/"),
            Some(&owner),
            Some(json!({"title": "Rust 2"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..100 {
        if !app.mailer.recipients().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(app.mailer.recipients(), ["student@example.com"]);
    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "Обновление курса: Rust 2");
}

#[tokio::test]
async fn test_payment_uses_fallback_rate() {
    let app = spawn_app_with(None, FakeStripe::default()).await;
    let (user_id, token) = app.user("buyer@example.com").await;
    let course_id = app.course(&token, "Rust").await;

    let (status, body) = app
        .call(
            "POST",
            "/payment/",
            Some(&token),
            Some(json!({"course": course_id, "amount": 9000, "payment_method": "transfer"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"], user_id);
    assert!(body["session_id"].as_str().unwrap().starts_with("cs_"));
    assert!(body["link"].as_str().unwrap().starts_with("https://"));

    assert_eq!(*app.stripe.unit_amounts.lock().unwrap(), [10_000]);
}

#[tokio::test]
async fn test_payment_provider_failure_leaves_no_row() {
    let stripe = FakeStripe {
        fail: true,
        ..Default::default()
    };
    let app = spawn_app_with(Some(90.0), stripe).await;
    let (_, token) = app.user("buyer@example.com").await;
    let course_id = app.course(&token, "Rust").await;

    let (status, _) = app
        .call(
            "POST",
            "/payment/",
            Some(&token),
            Some(json!({"course": course_id, "amount": 9000, "payment_method": "cash"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = app.call("GET", "/payments/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_idempotency_key() {
    let app = spawn_app().await;
    let (_, token) = app.user("buyer@example.com").await;
    let course_id = app.course(&token, "Rust").await;
    let payload = json!({"course": course_id, "amount": 4500, "payment_method": "cash"});

    let (status, first) = app
        .call_with_headers(
            "POST",
            "/payment/",
            Some(&token),
            &[("Idempotency-Key", "order-1")],
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let calls = app.stripe.calls.load(Ordering::SeqCst);

    let (status, second) = app
        .call_with_headers(
            "POST",
            "/payment/",
            Some(&token),
            &[("Idempotency-Key", "order-1")],
            Some(payload),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["link"], second["link"]);
    assert_eq!(app.stripe.calls.load(Ordering::SeqCst), calls);

    let (_, list) = app.call("GET", "/payments/", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_key_in_flight_is_a_conflict() {
    let app = spawn_app().await;
    let (buyer_id, token) = app.user("buyer@example.com").await;
    let course_id = app.course(&token, "Rust").await;

    // Row stored by a first request that has not opened its session yet
    app.shared
        .store
        .create_payment(NewPayment {
            user_id: buyer_id,
            course_id: Some(i32::try_from(course_id).unwrap()),
            lesson_id: None,
            amount: 4500,
            payment_method: PaymentMethod::Cash,
            idempotency_key: Some("order-1".to_string()),
        })
        .await
        .unwrap();

    let (status, body) = app
        .call_with_headers(
            "POST",
            "/payment/",
            Some(&token),
            &[("Idempotency-Key", "order-1")],
            Some(json!({"course": course_id, "amount": 4500, "payment_method": "cash"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(body["detail"].as_str().unwrap().contains("Idempotency-Key"));
    assert_eq!(app.stripe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_payment_validation() {
    let app = spawn_app().await;
    let (_, token) = app.user("buyer@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/payment/",
            Some(&token),
            Some(json!({"course": 404, "amount": 100, "payment_method": "cash"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("course").is_some());
    assert_eq!(app.stripe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = spawn_app().await;
    app.user("alice@example.com").await;
    let (_, refresh) = app.login("alice@example.com").await;

    let (status, body) = app.call("GET", "/users/", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Given token not valid for any token type");

    let (status, body) = app
        .call(
            "POST",
            "/users/token/refresh/",
            None,
            Some(json!({"refresh": refresh})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap();

    let (status, _) = app.call("GET", "/users/", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_profile_visibility() {
    let app = spawn_app().await;
    let (alice_id, alice) = app.user("alice@example.com").await;
    let (bob_id, _) = app.user("bob@example.com").await;

    let (status, body) = app
        .call("GET", &format!("/users/{alice_id}/"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("payments").is_some());

    let (status, body) = app
        .call("GET", &format!("/users/{bob_id}/"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("payments").is_none());
    assert!(body.get("last_name").is_none());

    let (status, _) = app
        .call(
            "PATCH",
            &format!("/users/{bob_id}/"),
            Some(&alice),
            Some(json!({"city": "Kazan"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inactive_users_cannot_log_in() {
    let app = spawn_app().await;
    let (id, _) = app.user("sleepy@example.com").await;
    let store = &app.shared.store;

    store
        .record_login(id, Utc::now() - Duration::days(31))
        .await
        .unwrap();

    let deactivated = lms::services::deactivate_inactive_users(store, Utc::now(), 30)
        .await
        .unwrap();
    assert_eq!(deactivated, 1);

    let (status, _) = app
        .call(
            "POST",
            "/users/login/",
            None,
            Some(json!({"email": "sleepy@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
