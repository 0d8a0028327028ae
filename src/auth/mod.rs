//! Authentication and authorization.

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod token;

pub use current_user::CurrentUser;
