pub use super::news::Entity as News;
pub use super::users::Entity as Users;
