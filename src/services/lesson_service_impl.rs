//! `SeaORM` implementation of the `LessonService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::{LessonChanges, NewLesson, Store};
use crate::domain::{
    Action, Caller, FieldErrors, Page, PageRequest, Resource, rule_for, visibility_for,
};
use crate::entities::lessons;
use crate::services::lesson_service::{LessonError, LessonService};

pub struct SeaOrmLessonService {
    store: Store,
}

impl SeaOrmLessonService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn authorize(
        &self,
        caller: &Caller,
        id: i32,
        action: Action,
    ) -> Result<lessons::Model, LessonError> {
        let rule = rule_for(Resource::Lesson, action);
        if !rule.permits_view(caller) {
            return Err(LessonError::Forbidden);
        }

        let lesson = self
            .store
            .get_lesson(id)
            .await?
            .filter(|l| caller.visibility().can_see(l.owner_id))
            .ok_or(LessonError::NotFound(id))?;

        if !rule.permits_object(caller, lesson.owner_id) {
            return Err(LessonError::Forbidden);
        }

        Ok(lesson)
    }

    async fn check_course(&self, course_id: Option<i32>) -> Result<(), LessonError> {
        if let Some(course_id) = course_id
            && !self.store.course_exists(course_id).await?
        {
            return Err(LessonError::Validation(FieldErrors::single(
                "course",
                format!("Invalid pk \"{course_id}\" - object does not exist."),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LessonService for SeaOrmLessonService {
    async fn list(
        &self,
        caller: Option<&Caller>,
        page: PageRequest,
    ) -> Result<Page<lessons::Model>, LessonError> {
        let (items, total) = self
            .store
            .list_lessons(visibility_for(caller), page.page, page.page_size)
            .await?;

        Ok(Page {
            items,
            total,
            request: page,
        })
    }

    async fn create(&self, caller: &Caller, input: NewLesson) -> Result<lessons::Model, LessonError> {
        if !rule_for(Resource::Lesson, Action::Create).permits_view(caller) {
            return Err(LessonError::Forbidden);
        }
        self.check_course(input.course_id).await?;

        let lesson = self.store.create_lesson(caller.user_id, input).await?;
        info!(lesson_id = lesson.id, owner_id = caller.user_id, "Lesson created");

        Ok(lesson)
    }

    async fn get(&self, caller: &Caller, id: i32) -> Result<lessons::Model, LessonError> {
        self.authorize(caller, id, Action::Retrieve).await
    }

    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: LessonChanges,
        action: Action,
    ) -> Result<lessons::Model, LessonError> {
        self.authorize(caller, id, action).await?;
        self.check_course(changes.course_id.flatten()).await?;

        let lesson = self
            .store
            .update_lesson(id, changes)
            .await?
            .ok_or(LessonError::NotFound(id))?;
        info!(lesson_id = id, user_id = caller.user_id, "Lesson updated");

        Ok(lesson)
    }

    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), LessonError> {
        self.authorize(caller, id, Action::Destroy).await?;

        self.store.delete_lesson(id).await?;
        info!(lesson_id = id, user_id = caller.user_id, "Lesson deleted");

        Ok(())
    }
}
