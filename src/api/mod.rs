use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod courses;
mod error;
mod lessons;
mod observability;
mod pagination;
mod payments;
mod subscriptions;
mod system;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use pagination::Paginated;
pub use types::*;

use crate::services::{
    AuthService, CourseService, LessonService, PaymentService, SubscriptionService, UserService,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn user_service(&self) -> &Arc<dyn UserService> {
        &self.shared.user_service
    }

    #[must_use]
    pub fn course_service(&self) -> &Arc<dyn CourseService> {
        &self.shared.course_service
    }

    #[must_use]
    pub fn lesson_service(&self) -> &Arc<dyn LessonService> {
        &self.shared.lesson_service
    }

    #[must_use]
    pub fn subscription_service(&self) -> &Arc<dyn SubscriptionService> {
        &self.shared.subscription_service
    }

    #[must_use]
    pub fn payment_service(&self) -> &Arc<dyn PaymentService> {
        &self.shared.payment_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route(
            "/courses/",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/{id}/",
            get(courses::get_course)
                .put(courses::update_course)
                .patch(courses::patch_course)
                .delete(courses::delete_course),
        )
        .route(
            "/lessons/",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route(
            "/lessons/{id}/",
            get(lessons::get_lesson)
                .put(lessons::update_lesson)
                .patch(lessons::patch_lesson)
                .delete(lessons::delete_lesson),
        )
        .route("/subs/", post(subscriptions::toggle_subscription))
        .route("/payment/", post(payments::create_payment))
        .route("/payments/", get(payments::list_payments))
        .route("/payments/{id}/", get(payments::get_payment))
        .route("/users/", get(users::list_users))
        .route("/users/register/", post(users::register))
        .route("/users/login/", post(auth::login))
        .route("/users/token/refresh/", post(auth::refresh))
        .route(
            "/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/health/", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state)
}
