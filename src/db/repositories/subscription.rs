use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait, sea_query::OnConflict,
};
use std::collections::HashSet;

use crate::domain::SubscriptionToggle;
use crate::entities::{prelude::*, subscriptions, users};

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Flips the (user, course) subscription inside one transaction.
    ///
    /// The delete runs first; only when nothing was removed is a row
    /// inserted, and the unique (user, course) index turns a concurrent
    /// duplicate insert into a no-op.
    pub async fn toggle(&self, user_id: i32, course_id: i32) -> Result<SubscriptionToggle> {
        let txn = self.conn.begin().await?;

        let removed = Subscriptions::delete_many()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await
            .context("Failed to remove subscription")?;

        let outcome = if removed.rows_affected > 0 {
            SubscriptionToggle::Removed
        } else {
            Subscriptions::insert(subscriptions::ActiveModel {
                user_id: Set(user_id),
                course_id: Set(course_id),
                created_at: Set(Utc::now()),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::columns([
                    subscriptions::Column::UserId,
                    subscriptions::Column::CourseId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .do_nothing()
            .exec(&txn)
            .await
            .context("Failed to add subscription")?;

            SubscriptionToggle::Added
        };

        txn.commit().await?;
        Ok(outcome)
    }

    pub async fn count_for(&self, user_id: i32, course_id: i32) -> Result<u64> {
        let count = Subscriptions::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::CourseId.eq(course_id))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    /// Ids among `course_ids` the user is subscribed to.
    pub async fn subscribed_course_ids(
        &self,
        user_id: i32,
        course_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        if course_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<i32> = Subscriptions::find()
            .select_only()
            .column(subscriptions::Column::CourseId)
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::CourseId.is_in(course_ids.to_vec()))
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(ids.into_iter().collect())
    }

    /// Emails of active users subscribed to the course.
    pub async fn subscriber_emails(&self, course_id: i32) -> Result<Vec<String>> {
        let emails: Vec<String> = Subscriptions::find()
            .inner_join(Users)
            .select_only()
            .column(users::Column::Email)
            .filter(subscriptions::Column::CourseId.eq(course_id))
            .filter(users::Column::IsActive.eq(true))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load subscriber emails")?;

        Ok(emails)
    }
}
