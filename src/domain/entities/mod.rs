pub mod program;
pub mod record;
pub mod response;
pub mod token;
pub mod topic;
pub mod upload;
pub mod user;
