use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::{Expr, OnConflict},
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::{
    courses, groups, lessons, payments, prelude::*, subscriptions, user_groups, users,
};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            city: model.city,
            is_active: model.is_active,
            last_login: model.last_login,
            date_joined: model.date_joined,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub city: Option<Option<String>>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new_user: NewUser, security: &SecurityConfig) -> Result<User> {
        let password = new_user.password;
        let security = security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let model = users::ActiveModel {
            email: Set(new_user.email),
            password_hash: Set(password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            phone: Set(new_user.phone),
            city: Set(new_user.city),
            is_active: Set(true),
            last_login: Set(None),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn email_taken(&self, email: &str, except_id: Option<i32>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Email.eq(email));
        if let Some(id) = except_id {
            query = query.filter(users::Column::Id.ne(id));
        }

        Ok(query.one(&self.conn).await?.is_some())
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = Users::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Returns the user when the password matches.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }

    pub async fn update(
        &self,
        id: i32,
        changes: UserChanges,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        let Some(user) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let new_hash = match changes.password {
            Some(password) => {
                let security = security.clone();
                Some(
                    task::spawn_blocking(move || hash_password(&password, Some(&security)))
                        .await
                        .context("Password hashing task panicked")??,
                )
            }
            None => None,
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(hash) = new_hash {
            active.password_hash = Set(hash);
        }
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(phone);
        }
        if let Some(city) = changes.city {
            active.city = Set(city);
        }

        let model = active.update(&self.conn).await?;
        Ok(Some(User::from(model)))
    }

    /// Removes the user and everything they own in one transaction.
    ///
    /// Lessons that belonged to the user's courses but are owned by someone
    /// else are kept with their course cleared.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let course_ids: Vec<i32> = Courses::find()
            .select_only()
            .column(courses::Column::Id)
            .filter(courses::Column::OwnerId.eq(id))
            .into_tuple()
            .all(&txn)
            .await?;

        let lesson_ids: Vec<i32> = Lessons::find()
            .select_only()
            .column(lessons::Column::Id)
            .filter(lessons::Column::OwnerId.eq(id))
            .into_tuple()
            .all(&txn)
            .await?;

        Payments::delete_many()
            .filter(payments::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        if !lesson_ids.is_empty() {
            Payments::update_many()
                .col_expr(payments::Column::LessonId, Expr::value(Option::<i32>::None))
                .filter(payments::Column::LessonId.is_in(lesson_ids.clone()))
                .exec(&txn)
                .await?;
            Lessons::delete_many()
                .filter(lessons::Column::Id.is_in(lesson_ids))
                .exec(&txn)
                .await?;
        }

        if !course_ids.is_empty() {
            Lessons::update_many()
                .col_expr(lessons::Column::CourseId, Expr::value(Option::<i32>::None))
                .filter(lessons::Column::CourseId.is_in(course_ids.clone()))
                .exec(&txn)
                .await?;
            Payments::update_many()
                .col_expr(payments::Column::CourseId, Expr::value(Option::<i32>::None))
                .filter(payments::Column::CourseId.is_in(course_ids.clone()))
                .exec(&txn)
                .await?;
            Subscriptions::delete_many()
                .filter(subscriptions::Column::CourseId.is_in(course_ids.clone()))
                .exec(&txn)
                .await?;
            Courses::delete_many()
                .filter(courses::Column::Id.is_in(course_ids))
                .exec(&txn)
                .await?;
        }

        Subscriptions::delete_many()
            .filter(subscriptions::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        UserGroups::delete_many()
            .filter(user_groups::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        let result = Users::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn record_login(&self, id: i32, at: DateTime<Utc>) -> Result<()> {
        Users::update_many()
            .col_expr(users::Column::LastLogin, Expr::value(Some(at)))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record login")?;

        Ok(())
    }

    pub async fn is_in_group(&self, user_id: i32, group_name: &str) -> Result<bool> {
        let membership = UserGroups::find()
            .inner_join(Groups)
            .filter(user_groups::Column::UserId.eq(user_id))
            .filter(groups::Column::Name.eq(group_name))
            .one(&self.conn)
            .await
            .context("Failed to query group membership")?;

        Ok(membership.is_some())
    }

    /// Adds the user to an existing group. Unknown group names are an error.
    pub async fn add_to_group(&self, user_id: i32, group_name: &str) -> Result<()> {
        let txn = self.conn.begin().await?;

        let group = Groups::find()
            .filter(groups::Column::Name.eq(group_name))
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Unknown group '{group_name}'"))?;

        UserGroups::insert(user_groups::ActiveModel {
            user_id: Set(user_id),
            group_id: Set(group.id),
        })
        .on_conflict(
            OnConflict::columns([user_groups::Column::UserId, user_groups::Column::GroupId])
                .do_nothing()
                .to_owned(),
        )
        .do_nothing()
        .exec(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn remove_from_group(&self, user_id: i32, group_name: &str) -> Result<bool> {
        let Some(group) = Groups::find()
            .filter(groups::Column::Name.eq(group_name))
            .one(&self.conn)
            .await?
        else {
            return Ok(false);
        };

        let result = UserGroups::delete_many()
            .filter(user_groups::Column::UserId.eq(user_id))
            .filter(user_groups::Column::GroupId.eq(group.id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Clears the active flag for users whose last login is at or before
    /// `cutoff`. Users that never logged in are left alone.
    pub async fn deactivate_last_login_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = Users::update_many()
            .col_expr(users::Column::IsActive, Expr::value(false))
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::LastLogin.is_not_null())
            .filter(users::Column::LastLogin.lte(cutoff))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate inactive users")?;

        Ok(result.rows_affected)
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the argon2 crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
