//! Domain service for lessons.

use thiserror::Error;

use crate::db::{LessonChanges, NewLesson};
use crate::domain::{Action, Caller, FieldErrors, Page, PageRequest};
use crate::entities::lessons;

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("Lesson {0} not found")]
    NotFound(i32),

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for LessonError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for LessonError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait LessonService: Send + Sync {
    async fn list(
        &self,
        caller: Option<&Caller>,
        page: PageRequest,
    ) -> Result<Page<lessons::Model>, LessonError>;

    /// # Errors
    ///
    /// [`LessonError::Validation`] when the referenced course does not exist,
    /// [`LessonError::Forbidden`] for moderators.
    async fn create(&self, caller: &Caller, input: NewLesson) -> Result<lessons::Model, LessonError>;

    async fn get(&self, caller: &Caller, id: i32) -> Result<lessons::Model, LessonError>;

    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: LessonChanges,
        action: Action,
    ) -> Result<lessons::Model, LessonError>;

    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), LessonError>;
}
