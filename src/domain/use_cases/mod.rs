pub mod auth;
pub mod extractors;
pub mod programs;
pub mod records;
pub mod topics;
pub mod upload;
