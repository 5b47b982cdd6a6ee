use crate::repositories::sqlx_repo::{SqlxProgramRepo, SqlxRecordRepo, SqlxTopicRepo, SqlxUserRepo};

#[derive(Clone)]
pub struct SharedRepositories {
    pub user_repo: SqlxUserRepo,
    pub program_repo: SqlxProgramRepo,
    pub topic_repo: SqlxTopicRepo,
    pub record_repo: SqlxRecordRepo,
}

impl SharedRepositories {
    pub fn new(pool: sqlx::PgPool) -> Self {
        let user_repo = SqlxUserRepo::new(pool.clone());
        let program_repo = SqlxProgramRepo::new(pool.clone());
        let topic_repo = SqlxTopicRepo::new(pool.clone());
        let record_repo = SqlxRecordRepo::new(pool);

        SharedRepositories {
            user_repo,
            program_repo,
            topic_repo,
            record_repo,
        }
    }
}
