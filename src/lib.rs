use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod shared_repos;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, middlewares, multipart, repositories, routes};
pub use infrastructure::{auth, db, storage, utils};

use auth::jwt::JwtService;
use multipart::PartLimits;
use repositories::sqlx_repo::{SqlxProgramRepo, SqlxRecordRepo, SqlxTopicRepo, SqlxUserRepo};
use shared_repos::SharedRepositories;
use storage::{ImageCrateCompressor, UploadPaths};
use use_cases::{
    auth::AuthHandler, programs::ProgramHandler, records::RecordHandler, topics::TopicHandler,
    upload::UploadPipeline,
};

pub struct AppState {
    pub auth_handler: AppAuthHandler,
    pub program_handler: AppProgramHandler,
    pub topic_handler: AppTopicHandler,
    pub record_handler: AppRecordHandler,
    pub part_limits: PartLimits,
}

pub type AppAuthHandler = AuthHandler<SqlxUserRepo, JwtService>;
pub type AppProgramHandler = ProgramHandler<SqlxProgramRepo, ImageCrateCompressor>;
pub type AppTopicHandler = TopicHandler<SqlxTopicRepo, SqlxProgramRepo, ImageCrateCompressor>;
pub type AppRecordHandler = RecordHandler<SqlxRecordRepo, SqlxTopicRepo, ImageCrateCompressor>;

impl AppState {
    pub fn new(config: &settings::AppConfig, pool: sqlx::PgPool) -> Self {
        let repos = SharedRepositories::new(pool);
        let uploads = &config.uploads;

        let pipeline = UploadPipeline::new(
            UploadPaths::from_settings(uploads),
            Arc::new(ImageCrateCompressor::from_settings(uploads)),
            uploads,
        );

        AppState {
            auth_handler: AuthHandler::new(repos.user_repo, JwtService::new(config)),
            program_handler: ProgramHandler::new(repos.program_repo.clone(), pipeline.clone()),
            topic_handler: TopicHandler::new(repos.topic_repo.clone(), repos.program_repo, pipeline.clone()),
            record_handler: RecordHandler::new(repos.record_repo, repos.topic_repo, pipeline),
            part_limits: PartLimits::from(uploads),
        }
    }
}
