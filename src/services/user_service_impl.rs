//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use sea_orm::{DbErr, SqlErr};
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store, User, UserChanges};
use crate::domain::{Caller, FieldErrors};
use crate::services::user_service::{UserError, UserProfile, UserService};

const EMAIL_TAKEN: &str = "user with this email already exists.";

pub struct SeaOrmUserService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    async fn require(&self, id: i32) -> Result<User, UserError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    async fn full_profile(&self, user: User) -> Result<UserProfile, UserError> {
        let payments = self.store.list_user_payments(user.id).await?;
        Ok(UserProfile::Full { user, payments })
    }
}

/// A concurrent writer can take the email between the check and the write;
/// the unique index then reports it.
fn email_conflict(err: anyhow::Error) -> UserError {
    let unique_violation = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<DbErr>())
        .any(|db| matches!(db.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))));

    if unique_violation {
        UserError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
    } else {
        err.into()
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, input: NewUser) -> Result<User, UserError> {
        if self.store.email_taken(&input.email, None).await? {
            return Err(UserError::Validation(FieldErrors::single(
                "email",
                EMAIL_TAKEN,
            )));
        }

        let user = self
            .store
            .create_user(input, &self.security)
            .await
            .map_err(email_conflict)?;
        info!(user_id = user.id, "User registered");

        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, UserError> {
        Ok(self.store.list_users().await?)
    }

    async fn get(&self, caller: &Caller, id: i32) -> Result<UserProfile, UserError> {
        let user = self.require(id).await?;

        if caller.user_id == id {
            self.full_profile(user).await
        } else {
            Ok(UserProfile::Public(user))
        }
    }

    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: UserChanges,
    ) -> Result<UserProfile, UserError> {
        self.require(id).await?;
        if caller.user_id != id {
            return Err(UserError::Forbidden);
        }

        if let Some(email) = &changes.email
            && self.store.email_taken(email, Some(id)).await?
        {
            return Err(UserError::Validation(FieldErrors::single(
                "email",
                EMAIL_TAKEN,
            )));
        }

        let user = self
            .store
            .update_user(id, changes, &self.security)
            .await
            .map_err(email_conflict)?
            .ok_or(UserError::NotFound(id))?;

        self.full_profile(user).await
    }

    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), UserError> {
        self.require(id).await?;
        if caller.user_id != id {
            return Err(UserError::Forbidden);
        }

        self.store.delete_user(id).await?;
        info!(user_id = id, "User deleted");

        Ok(())
    }
}
