pub use super::courses::Entity as Courses;
pub use super::groups::Entity as Groups;
pub use super::lessons::Entity as Lessons;
pub use super::payments::Entity as Payments;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::user_groups::Entity as UserGroups;
pub use super::users::Entity as Users;
