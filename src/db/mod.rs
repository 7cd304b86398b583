use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::{SubscriptionToggle, Visibility};
use crate::entities::{courses, lessons, payments};

pub mod migrator;
pub mod repositories;

pub use migrator::m20260302_seed_moderator_group::MODERATOR_GROUP;
pub use repositories::course::{CourseChanges, CourseWithLessons, NewCourse};
pub use repositories::lesson::{LessonChanges, NewLesson};
pub use repositories::payment::{NewPayment, PaymentFilter, PaymentOrdering};
pub use repositories::user::{NewUser, User, UserChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn course_repo(&self) -> repositories::course::CourseRepository {
        repositories::course::CourseRepository::new(self.conn.clone())
    }

    fn lesson_repo(&self) -> repositories::lesson::LessonRepository {
        repositories::lesson::LessonRepository::new(self.conn.clone())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    fn payment_repo(&self) -> repositories::payment::PaymentRepository {
        repositories::payment::PaymentRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(&self, user: NewUser, security: &SecurityConfig) -> Result<User> {
        self.user_repo().create(user, security).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn email_taken(&self, email: &str, except_id: Option<i32>) -> Result<bool> {
        self.user_repo().email_taken(email, except_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo().update(id, changes, security).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn record_login(&self, id: i32, at: DateTime<Utc>) -> Result<()> {
        self.user_repo().record_login(id, at).await
    }

    pub async fn is_moderator(&self, user_id: i32) -> Result<bool> {
        self.user_repo().is_in_group(user_id, MODERATOR_GROUP).await
    }

    pub async fn add_user_to_group(&self, user_id: i32, group: &str) -> Result<()> {
        self.user_repo().add_to_group(user_id, group).await
    }

    pub async fn remove_user_from_group(&self, user_id: i32, group: &str) -> Result<bool> {
        self.user_repo().remove_from_group(user_id, group).await
    }

    pub async fn deactivate_users_last_seen_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.user_repo().deactivate_last_login_before(cutoff).await
    }

    // Courses

    pub async fn create_course(&self, owner_id: i32, course: NewCourse) -> Result<courses::Model> {
        self.course_repo().create(owner_id, course).await
    }

    pub async fn get_course(&self, id: i32) -> Result<Option<courses::Model>> {
        self.course_repo().get(id).await
    }

    pub async fn course_exists(&self, id: i32) -> Result<bool> {
        self.course_repo().exists(id).await
    }

    pub async fn list_courses(
        &self,
        visibility: Visibility,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<courses::Model>, u64)> {
        self.course_repo()
            .list_page(visibility, page, page_size)
            .await
    }

    pub async fn courses_with_lessons(
        &self,
        courses: Vec<courses::Model>,
    ) -> Result<Vec<CourseWithLessons>> {
        self.course_repo().with_lessons(courses).await
    }

    pub async fn update_course(
        &self,
        id: i32,
        changes: CourseChanges,
    ) -> Result<Option<courses::Model>> {
        self.course_repo().update(id, changes).await
    }

    pub async fn delete_course(&self, id: i32) -> Result<bool> {
        self.course_repo().delete(id).await
    }

    // Lessons

    pub async fn create_lesson(&self, owner_id: i32, lesson: NewLesson) -> Result<lessons::Model> {
        self.lesson_repo().create(owner_id, lesson).await
    }

    pub async fn get_lesson(&self, id: i32) -> Result<Option<lessons::Model>> {
        self.lesson_repo().get(id).await
    }

    pub async fn lesson_exists(&self, id: i32) -> Result<bool> {
        self.lesson_repo().exists(id).await
    }

    pub async fn list_lessons(
        &self,
        visibility: Visibility,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<lessons::Model>, u64)> {
        self.lesson_repo()
            .list_page(visibility, page, page_size)
            .await
    }

    pub async fn update_lesson(
        &self,
        id: i32,
        changes: LessonChanges,
    ) -> Result<Option<lessons::Model>> {
        self.lesson_repo().update(id, changes).await
    }

    pub async fn delete_lesson(&self, id: i32) -> Result<bool> {
        self.lesson_repo().delete(id).await
    }

    // Subscriptions

    pub async fn toggle_subscription(
        &self,
        user_id: i32,
        course_id: i32,
    ) -> Result<SubscriptionToggle> {
        self.subscription_repo().toggle(user_id, course_id).await
    }

    pub async fn subscription_count(&self, user_id: i32, course_id: i32) -> Result<u64> {
        self.subscription_repo().count_for(user_id, course_id).await
    }

    pub async fn subscribed_course_ids(
        &self,
        user_id: i32,
        course_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        self.subscription_repo()
            .subscribed_course_ids(user_id, course_ids)
            .await
    }

    pub async fn subscriber_emails(&self, course_id: i32) -> Result<Vec<String>> {
        self.subscription_repo().subscriber_emails(course_id).await
    }

    // Payments

    pub async fn create_payment(&self, payment: NewPayment) -> Result<payments::Model> {
        self.payment_repo().create(payment).await
    }

    pub async fn get_payment(&self, id: i32) -> Result<Option<payments::Model>> {
        self.payment_repo().get(id).await
    }

    pub async fn find_payment_by_idempotency_key(
        &self,
        user_id: i32,
        key: &str,
    ) -> Result<Option<payments::Model>> {
        self.payment_repo()
            .find_by_idempotency_key(user_id, key)
            .await
    }

    pub async fn attach_payment_session(
        &self,
        id: i32,
        session_id: &str,
        link: &str,
    ) -> Result<Option<payments::Model>> {
        self.payment_repo()
            .attach_session(id, session_id, link)
            .await
    }

    pub async fn delete_payment(&self, id: i32) -> Result<bool> {
        self.payment_repo().delete(id).await
    }

    pub async fn list_payments(
        &self,
        visibility: Visibility,
        filter: &PaymentFilter,
    ) -> Result<Vec<payments::Model>> {
        self.payment_repo().list(visibility, filter).await
    }

    pub async fn list_user_payments(&self, user_id: i32) -> Result<Vec<payments::Model>> {
        self.payment_repo().list_for_user(user_id).await
    }
}
