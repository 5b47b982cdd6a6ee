use sqlx::PgPool;

#[derive(Clone)]
pub struct SqlxUserRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxProgramRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxTopicRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxRecordRepo {
    pub pool: PgPool,
}
