pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{UserError, UserProfile, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod course_service;
pub mod course_service_impl;
pub use course_service::{CourseDetails, CourseError, CourseService};
pub use course_service_impl::SeaOrmCourseService;

pub mod lesson_service;
pub mod lesson_service_impl;
pub use lesson_service::{LessonError, LessonService};
pub use lesson_service_impl::SeaOrmLessonService;

pub mod subscription_service;
pub use subscription_service::{SeaOrmSubscriptionService, SubscriptionError, SubscriptionService};

pub mod payment_service;
pub mod payment_service_impl;
pub use payment_service::{CreatePayment, PaymentError, PaymentService, rub_to_usd_cents};
pub use payment_service_impl::SeaOrmPaymentService;

pub mod tokens;
pub use tokens::{Claims, TokenCodec, TokenError, TokenPair, TokenType};

pub mod notifications;
pub use notifications::{DeliveryReport, notify_course_update};

pub mod task_queue;
pub use task_queue::{Task, TaskQueue};

pub mod maintenance;
pub use maintenance::deactivate_inactive_users;

pub mod scheduler;
pub use scheduler::Scheduler;
