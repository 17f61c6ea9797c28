pub use super::secrets::Entity as Secrets;
pub use super::users::Entity as Users;
