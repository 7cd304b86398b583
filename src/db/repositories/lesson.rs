use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::domain::Visibility;
use crate::entities::{lessons, payments, prelude::*};

#[derive(Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub link_to_video: String,
    pub course_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview: Option<Option<String>>,
    pub link_to_video: Option<String>,
    pub course_id: Option<Option<i32>>,
}

pub struct LessonRepository {
    conn: DatabaseConnection,
}

impl LessonRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner_id: i32, lesson: NewLesson) -> Result<lessons::Model> {
        let model = lessons::ActiveModel {
            title: Set(lesson.title),
            description: Set(lesson.description),
            preview: Set(lesson.preview),
            link_to_video: Set(lesson.link_to_video),
            course_id: Set(lesson.course_id),
            owner_id: Set(Some(owner_id)),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert lesson")?;

        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<lessons::Model>> {
        Lessons::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query lesson")
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        let count = Lessons::find()
            .filter(lessons::Column::Id.eq(id))
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_page(
        &self,
        visibility: Visibility,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<lessons::Model>, u64)> {
        let mut query = Lessons::find().order_by_asc(lessons::Column::Id);

        match visibility {
            Visibility::All => {}
            Visibility::OwnedBy(owner_id) => {
                query = query.filter(lessons::Column::OwnerId.eq(owner_id));
            }
            Visibility::Nothing => return Ok((Vec::new(), 0)),
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    pub async fn update(&self, id: i32, changes: LessonChanges) -> Result<Option<lessons::Model>> {
        let Some(lesson) = Lessons::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: lessons::ActiveModel = lesson.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(preview) = changes.preview {
            active.preview = Set(preview);
        }
        if let Some(link) = changes.link_to_video {
            active.link_to_video = Set(link);
        }
        if let Some(course_id) = changes.course_id {
            active.course_id = Set(course_id);
        }

        let model = active.update(&self.conn).await?;
        Ok(Some(model))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Payments::update_many()
            .col_expr(payments::Column::LessonId, Expr::value(Option::<i32>::None))
            .filter(payments::Column::LessonId.eq(id))
            .exec(&txn)
            .await?;

        let result = Lessons::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}
