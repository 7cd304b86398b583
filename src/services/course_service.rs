//! Domain service for courses.

use thiserror::Error;

use crate::db::{CourseChanges, NewCourse};
use crate::domain::{Action, Caller, Page, PageRequest};
use crate::entities::{courses, lessons};

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("Course {0} not found")]
    NotFound(i32),

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CourseError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CourseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A course as presented to one caller.
#[derive(Debug, Clone)]
pub struct CourseDetails {
    pub course: courses::Model,
    pub lessons: Vec<lessons::Model>,
    pub is_subscribed: bool,
}

impl CourseDetails {
    #[must_use]
    pub fn lessons_count(&self) -> usize {
        self.lessons.len()
    }
}

#[async_trait::async_trait]
pub trait CourseService: Send + Sync {
    /// Courses visible to the caller. Anonymous callers get an empty page.
    async fn list(
        &self,
        caller: Option<&Caller>,
        page: PageRequest,
    ) -> Result<Page<CourseDetails>, CourseError>;

    /// Creates a course owned by the caller. Moderators may not create.
    async fn create(&self, caller: &Caller, input: NewCourse) -> Result<CourseDetails, CourseError>;

    async fn get(&self, caller: &Caller, id: i32) -> Result<CourseDetails, CourseError>;

    /// Applies `changes` and queues an update notice for subscribers.
    ///
    /// `action` distinguishes full from partial updates for the permission
    /// check.
    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: CourseChanges,
        action: Action,
    ) -> Result<CourseDetails, CourseError>;

    /// Owner only. Lessons of the course are kept with the course cleared.
    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), CourseError>;
}
