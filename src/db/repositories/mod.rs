pub mod course;
pub mod lesson;
pub mod payment;
pub mod subscription;
pub mod user;
