use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::entities::{lessons, payments};
use crate::services::{CourseDetails, UserProfile};

// ============================================================================
// Courses & lessons
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LessonDto {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub link_to_video: String,
    pub course: Option<i32>,
    pub owner: Option<i32>,
}

impl From<lessons::Model> for LessonDto {
    fn from(lesson: lessons::Model) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title,
            description: lesson.description,
            preview: lesson.preview,
            link_to_video: lesson.link_to_video,
            course: lesson.course_id,
            owner: lesson.owner_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseDto {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub owner: Option<i32>,
    pub lessons_count: usize,
    pub lessons: Vec<LessonDto>,
    pub is_subscribed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CourseDetails> for CourseDto {
    fn from(details: CourseDetails) -> Self {
        let lessons_count = details.lessons_count();
        let course = details.course;
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            preview: course.preview,
            owner: course.owner_id,
            lessons_count,
            lessons: details.lessons.into_iter().map(LessonDto::from).collect(),
            is_subscribed: details.is_subscribed,
            created_at: course.created_at.to_rfc3339(),
            updated_at: course.updated_at.to_rfc3339(),
        }
    }
}

/// Body of course create/update requests. Every field is optional here;
/// handlers decide what is required for the method.
#[derive(Debug, Default, Deserialize)]
pub struct CourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Empty string clears the preview
    pub preview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview: Option<String>,
    pub link_to_video: Option<String>,
    /// `None` when absent, `Some(None)` for an explicit `null` that detaches the lesson
    #[serde(default, deserialize_with = "present")]
    pub course: Option<Option<i32>>,
}

/// Marks a field as present so that `null` can be told apart from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionRequest {
    pub course_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: i32,
    pub user: Option<i32>,
    pub payment_date: String,
    pub course: Option<i32>,
    pub lesson: Option<i32>,
    pub amount: i64,
    pub payment_method: String,
    pub session_id: Option<String>,
    pub link: Option<String>,
}

impl From<payments::Model> for PaymentDto {
    fn from(payment: payments::Model) -> Self {
        Self {
            id: payment.id,
            user: payment.user_id,
            payment_date: payment.payment_date.to_rfc3339(),
            course: payment.course_id,
            lesson: payment.lesson_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            session_id: payment.session_id,
            link: payment.link,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    pub course: Option<i32>,
    pub lesson: Option<i32>,
    pub amount: Option<i64>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub course: Option<i32>,
    pub lesson: Option<i32>,
    pub payment_method: Option<String>,
    pub ordering: Option<String>,
}

// ============================================================================
// Users & auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PublicUserDto {
    pub id: i32,
    pub email: String,
    pub first_name: String,
}

impl From<User> for PublicUserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FullUserDto {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub payments: Vec<PaymentDto>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserDto {
    Full(FullUserDto),
    Public(PublicUserDto),
}

impl UserDto {
    #[must_use]
    pub fn full(user: User, payments: Vec<payments::Model>) -> Self {
        Self::Full(FullUserDto {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            city: user.city,
            payments: payments.into_iter().map(PaymentDto::from).collect(),
        })
    }
}

impl From<UserProfile> for UserDto {
    fn from(profile: UserProfile) -> Self {
        match profile {
            UserProfile::Full { user, payments } => Self::full(user, payments),
            UserProfile::Public(user) => Self::Public(user.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
    pub uptime_seconds: u64,
}
