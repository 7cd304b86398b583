//! Domain service for user accounts.

use thiserror::Error;

use crate::db::{NewUser, User, UserChanges};
use crate::domain::{Caller, FieldErrors};
use crate::entities::payments;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} not found")]
    NotFound(i32),

    #[error("You can only modify your own profile")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// What a caller may see of a user record.
#[derive(Debug, Clone)]
pub enum UserProfile {
    /// The caller's own record, with payment history
    Full {
        user: User,
        payments: Vec<payments::Model>,
    },
    Public(User),
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an active account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] when the email is already registered.
    async fn register(&self, input: NewUser) -> Result<User, UserError>;

    async fn list(&self) -> Result<Vec<User>, UserError>;

    /// Full profile for the caller's own id, public profile otherwise.
    async fn get(&self, caller: &Caller, id: i32) -> Result<UserProfile, UserError>;

    /// Self-only.
    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: UserChanges,
    ) -> Result<UserProfile, UserError>;

    /// Self-only. Removes everything the user owns.
    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), UserError>;
}
