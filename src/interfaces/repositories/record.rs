use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    entities::record::{Record, RecordImageUpsert},
    errors::AppError,
    repositories::sqlx_repo::SqlxRecordRepo,
};

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Creates the record or replaces its image. Fails with a conflict when the id already
    /// belongs to a record of another topic.
    async fn upsert_record_image(&self, record: &RecordImageUpsert) -> Result<Record, AppError>;

    async fn find_record(&self, id: &Uuid) -> Result<Option<Record>, AppError>;

    async fn set_record_image(&self, id: &Uuid, image: Option<String>) -> Result<(), AppError>;

    async fn list_records(&self, topic_id: &Uuid) -> Result<Vec<Record>, AppError>;
}

impl SqlxRecordRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxRecordRepo { pool }
    }
}

#[async_trait]
impl RecordRepository for SqlxRecordRepo {
    async fn upsert_record_image(&self, record: &RecordImageUpsert) -> Result<Record, AppError> {
        sqlx::query_as::<_, Record>(
            r#"
            INSERT INTO topic_records (id, topic_id, image, user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET image = EXCLUDED.image, updated_at = NOW()
                WHERE topic_records.topic_id = EXCLUDED.topic_id
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.topic_id)
        .bind(&record.image)
        .bind(record.user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Record {} belongs to another topic", record.id)))
    }

    async fn find_record(&self, id: &Uuid) -> Result<Option<Record>, AppError> {
        sqlx::query_as::<_, Record>("SELECT * FROM topic_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn set_record_image(&self, id: &Uuid, image: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE topic_records SET image = $1, updated_at = NOW() WHERE id = $2")
            .bind(image)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_records(&self, topic_id: &Uuid) -> Result<Vec<Record>, AppError> {
        let records = sqlx::query_as::<_, Record>(
            "SELECT * FROM topic_records WHERE topic_id = $1 ORDER BY created_at ASC",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
