use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::domain::Visibility;
use crate::entities::{courses, lessons, payments, prelude::*, subscriptions};

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview: Option<Option<String>>,
}

/// A course together with every lesson attached to it.
#[derive(Debug, Clone)]
pub struct CourseWithLessons {
    pub course: courses::Model,
    pub lessons: Vec<lessons::Model>,
}

pub struct CourseRepository {
    conn: DatabaseConnection,
}

impl CourseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner_id: i32, course: NewCourse) -> Result<courses::Model> {
        let now = Utc::now();
        let model = courses::ActiveModel {
            title: Set(course.title),
            description: Set(course.description),
            preview: Set(course.preview),
            owner_id: Set(Some(owner_id)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert course")?;

        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<courses::Model>> {
        Courses::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query course")
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        let count = Courses::find()
            .filter(courses::Column::Id.eq(id))
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }

    /// One page of courses visible under `visibility`, ordered by id, plus
    /// the total number of visible courses.
    pub async fn list_page(
        &self,
        visibility: Visibility,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<courses::Model>, u64)> {
        let mut query = Courses::find().order_by_asc(courses::Column::Id);

        match visibility {
            Visibility::All => {}
            Visibility::OwnedBy(owner_id) => {
                query = query.filter(courses::Column::OwnerId.eq(owner_id));
            }
            Visibility::Nothing => return Ok((Vec::new(), 0)),
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Loads the lessons of every course in one query.
    pub async fn with_lessons(&self, courses: Vec<courses::Model>) -> Result<Vec<CourseWithLessons>> {
        let lessons = courses
            .load_many(Lessons, &self.conn)
            .await
            .context("Failed to load course lessons")?;

        Ok(courses
            .into_iter()
            .zip(lessons)
            .map(|(course, mut lessons)| {
                lessons.sort_by_key(|l| l.id);
                CourseWithLessons { course, lessons }
            })
            .collect())
    }

    pub async fn update(&self, id: i32, changes: CourseChanges) -> Result<Option<courses::Model>> {
        let Some(course) = Courses::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: courses::ActiveModel = course.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(preview) = changes.preview {
            active.preview = Set(preview);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.conn).await?;
        Ok(Some(model))
    }

    /// Deletes the course. Its lessons are kept with the course cleared.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Lessons::update_many()
            .col_expr(lessons::Column::CourseId, Expr::value(Option::<i32>::None))
            .filter(lessons::Column::CourseId.eq(id))
            .exec(&txn)
            .await?;

        Payments::update_many()
            .col_expr(payments::Column::CourseId, Expr::value(Option::<i32>::None))
            .filter(payments::Column::CourseId.eq(id))
            .exec(&txn)
            .await?;

        Subscriptions::delete_many()
            .filter(subscriptions::Column::CourseId.eq(id))
            .exec(&txn)
            .await?;

        let result = Courses::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}
