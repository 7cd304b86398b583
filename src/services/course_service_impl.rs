//! `SeaORM` implementation of the `CourseService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::{CourseChanges, CourseWithLessons, NewCourse, Store};
use crate::domain::{Action, Caller, Page, PageRequest, Resource, rule_for, visibility_for};
use crate::entities::courses;
use crate::services::course_service::{CourseDetails, CourseError, CourseService};
use crate::services::task_queue::{Task, TaskQueue};

pub struct SeaOrmCourseService {
    store: Store,
    tasks: TaskQueue,
}

impl SeaOrmCourseService {
    #[must_use]
    pub const fn new(store: Store, tasks: TaskQueue) -> Self {
        Self { store, tasks }
    }

    /// Runs the rule check, the visibility-scoped lookup and the object check
    /// for `action` on course `id`.
    async fn authorize(
        &self,
        caller: &Caller,
        id: i32,
        action: Action,
    ) -> Result<courses::Model, CourseError> {
        let rule = rule_for(Resource::Course, action);
        if !rule.permits_view(caller) {
            return Err(CourseError::Forbidden);
        }

        let course = self
            .store
            .get_course(id)
            .await?
            .filter(|c| caller.visibility().can_see(c.owner_id))
            .ok_or(CourseError::NotFound(id))?;

        if !rule.permits_object(caller, course.owner_id) {
            return Err(CourseError::Forbidden);
        }

        Ok(course)
    }

    async fn details(
        &self,
        caller: Option<&Caller>,
        courses: Vec<courses::Model>,
    ) -> Result<Vec<CourseDetails>, CourseError> {
        let ids: Vec<i32> = courses.iter().map(|c| c.id).collect();
        let subscribed = match caller {
            Some(caller) if !ids.is_empty() => {
                self.store
                    .subscribed_course_ids(caller.user_id, &ids)
                    .await?
            }
            _ => Default::default(),
        };

        let loaded = self.store.courses_with_lessons(courses).await?;

        Ok(loaded
            .into_iter()
            .map(|CourseWithLessons { course, lessons }| CourseDetails {
                is_subscribed: subscribed.contains(&course.id),
                course,
                lessons,
            })
            .collect())
    }

    async fn single(
        &self,
        caller: &Caller,
        course: courses::Model,
    ) -> Result<CourseDetails, CourseError> {
        let id = course.id;
        self.details(Some(caller), vec![course])
            .await?
            .pop()
            .ok_or(CourseError::NotFound(id))
    }

    async fn queue_update_notice(&self, course: &courses::Model) -> Result<(), CourseError> {
        let recipients = self.store.subscriber_emails(course.id).await?;
        if recipients.is_empty() {
            return Ok(());
        }

        let task = Task::NotifyCourseUpdate {
            course_id: course.id,
            course_title: course.title.clone(),
            recipients,
        };
        if let Err(e) = self.tasks.enqueue(task) {
            warn!(course_id = course.id, error = %e, "Course update notice dropped");
        }

        Ok(())
    }
}

#[async_trait]
impl CourseService for SeaOrmCourseService {
    async fn list(
        &self,
        caller: Option<&Caller>,
        page: PageRequest,
    ) -> Result<Page<CourseDetails>, CourseError> {
        let (courses, total) = self
            .store
            .list_courses(visibility_for(caller), page.page, page.page_size)
            .await?;

        Ok(Page {
            items: self.details(caller, courses).await?,
            total,
            request: page,
        })
    }

    async fn create(&self, caller: &Caller, input: NewCourse) -> Result<CourseDetails, CourseError> {
        if !rule_for(Resource::Course, Action::Create).permits_view(caller) {
            return Err(CourseError::Forbidden);
        }

        let course = self.store.create_course(caller.user_id, input).await?;
        info!(course_id = course.id, owner_id = caller.user_id, "Course created");

        Ok(CourseDetails {
            course,
            lessons: Vec::new(),
            is_subscribed: false,
        })
    }

    async fn get(&self, caller: &Caller, id: i32) -> Result<CourseDetails, CourseError> {
        let course = self.authorize(caller, id, Action::Retrieve).await?;
        self.single(caller, course).await
    }

    async fn update(
        &self,
        caller: &Caller,
        id: i32,
        changes: CourseChanges,
        action: Action,
    ) -> Result<CourseDetails, CourseError> {
        self.authorize(caller, id, action).await?;

        let course = self
            .store
            .update_course(id, changes)
            .await?
            .ok_or(CourseError::NotFound(id))?;
        info!(course_id = id, user_id = caller.user_id, "Course updated");

        self.queue_update_notice(&course).await?;
        self.single(caller, course).await
    }

    async fn delete(&self, caller: &Caller, id: i32) -> Result<(), CourseError> {
        self.authorize(caller, id, Action::Destroy).await?;

        self.store.delete_course(id).await?;
        info!(course_id = id, user_id = caller.user_id, "Course deleted");

        Ok(())
    }
}
