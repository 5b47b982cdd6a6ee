use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Record {
    pub id: Uuid,
    #[serde(rename = "topic")]
    pub topic_id: Uuid,
    pub image: Option<String>,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecordImageUpsert {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub image: String,
    pub user_id: Uuid,
}

/// Response body of a record image upload.
#[derive(Debug, Serialize)]
pub struct RecordImageResponse {
    #[serde(flatten)]
    pub record: Record,
    pub program: Uuid,
    pub image_url: String,
}
