pub mod program;
pub mod record;
pub mod sqlx_repo;
pub mod token;
pub mod topic;
pub mod user;
