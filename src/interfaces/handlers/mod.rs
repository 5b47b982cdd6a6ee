pub mod auth;
pub mod home;
pub mod json_error;
pub mod programs;
pub mod records;
pub mod system;
pub mod topics;
pub mod users;
