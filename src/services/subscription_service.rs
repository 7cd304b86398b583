//! Subscription toggle.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::db::Store;
use crate::domain::{Caller, SubscriptionToggle};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Course {0} not found")]
    CourseNotFound(i32),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for SubscriptionError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for SubscriptionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Adds the (caller, course) subscription if absent, removes it otherwise.
    async fn toggle(
        &self,
        caller: &Caller,
        course_id: i32,
    ) -> Result<SubscriptionToggle, SubscriptionError>;
}

pub struct SeaOrmSubscriptionService {
    store: Store,
}

impl SeaOrmSubscriptionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubscriptionService for SeaOrmSubscriptionService {
    async fn toggle(
        &self,
        caller: &Caller,
        course_id: i32,
    ) -> Result<SubscriptionToggle, SubscriptionError> {
        if !self.store.course_exists(course_id).await? {
            return Err(SubscriptionError::CourseNotFound(course_id));
        }

        let outcome = self
            .store
            .toggle_subscription(caller.user_id, course_id)
            .await?;
        info!(
            user_id = caller.user_id,
            course_id,
            outcome = ?outcome,
            "Subscription toggled"
        );

        Ok(outcome)
    }
}
