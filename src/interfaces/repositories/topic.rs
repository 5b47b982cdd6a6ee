use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    entities::topic::{Topic, TopicChanges, TopicInsert, TopicQuery, TopicView},
    errors::AppError,
    repositories::sqlx_repo::SqlxTopicRepo,
};

const TOPIC_VIEW: &str = r#"
    SELECT
        t.id, t.title, t.description, t.photo, t.sections, t.publish, t.created_at, t.updated_at,
        json_build_object('id', p.id, 'title', p.title) AS program,
        json_build_object('id', u.id, 'name', u.name, 'email', u.email) AS "user"
    FROM topics t
    JOIN programs p ON p.id = t.program_id
    JOIN users u ON u.id = t.user_id
    WHERE TRUE"#;

#[async_trait]
pub trait TopicRepository: Send + Sync {
    async fn insert_topic(&self, topic: &TopicInsert) -> Result<Topic, AppError>;
    async fn find_topic(&self, id: &Uuid) -> Result<Option<Topic>, AppError>;
    async fn update_topic(&self, id: &Uuid, changes: &TopicChanges) -> Result<Topic, AppError>;
    async fn set_topic_photo(&self, id: &Uuid, photo: Option<String>) -> Result<(), AppError>;
    async fn delete_topic(&self, id: &Uuid) -> Result<(), AppError>;

    /// Deletes every listed topic that exists and returns the deleted rows
    async fn delete_topics(&self, ids: &[Uuid]) -> Result<Vec<Topic>, AppError>;

    async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<TopicView>, AppError>;
    async fn count_topics(&self, query: &TopicQuery) -> Result<i64, AppError>;
    async fn find_topic_view(&self, id: &Uuid) -> Result<Option<TopicView>, AppError>;
}

impl SqlxTopicRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxTopicRepo { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TopicQuery) {
    if let Some(program) = query.program {
        builder.push(" AND t.program_id = ").push_bind(program);
    }
    if let Some(owner) = query.owner {
        builder.push(" AND t.user_id = ").push_bind(owner);
    }
    if query.published_only {
        builder.push(" AND t.publish = TRUE");
    }
}

#[async_trait]
impl TopicRepository for SqlxTopicRepo {
    async fn insert_topic(&self, topic: &TopicInsert) -> Result<Topic, AppError> {
        let created = sqlx::query_as::<_, Topic>(
            r#"
            INSERT INTO topics (id, program_id, title, description, photo, sections, publish, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(topic.id)
        .bind(topic.program_id)
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(&topic.photo)
        .bind(Json(&topic.sections))
        .bind(topic.publish)
        .bind(topic.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_topic(&self, id: &Uuid) -> Result<Option<Topic>, AppError> {
        sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn update_topic(&self, id: &Uuid, changes: &TopicChanges) -> Result<Topic, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE topics SET updated_at = NOW()");

        if let Some(title) = &changes.fields.title {
            builder.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &changes.fields.description {
            let description = Some(description.clone()).filter(|d| !d.is_empty());
            builder.push(", description = ").push_bind(description);
        }
        if let Some(publish) = changes.fields.publish {
            builder.push(", publish = ").push_bind(publish);
        }
        if let Some(sections) = &changes.fields.sections {
            builder.push(", sections = ").push_bind(Json(sections.clone()));
        }
        if let Some(photo) = &changes.photo {
            builder.push(", photo = ").push_bind(photo.clone());
        }
        builder.push(" WHERE id = ").push_bind(*id);
        builder.push(" RETURNING *");

        builder
            .build_query_as::<Topic>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No topic with the id of {}", id)))
    }

    async fn set_topic_photo(&self, id: &Uuid, photo: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE topics SET photo = $1, updated_at = NOW() WHERE id = $2")
            .bind(photo)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_topic(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("No topic with the id of {}", id)));
        }
        Ok(())
    }

    async fn delete_topics(&self, ids: &[Uuid]) -> Result<Vec<Topic>, AppError> {
        let deleted = sqlx::query_as::<_, Topic>("DELETE FROM topics WHERE id = ANY($1) RETURNING *")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(deleted)
    }

    async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<TopicView>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(TOPIC_VIEW);
        push_filters(&mut builder, query);
        builder.push(" ORDER BY t.created_at DESC");
        builder.push(" LIMIT ").push_bind(query.limit);
        builder.push(" OFFSET ").push_bind(query.offset);

        let topics = builder
            .build_query_as::<TopicView>()
            .fetch_all(&self.pool)
            .await?;

        Ok(topics)
    }

    async fn count_topics(&self, query: &TopicQuery) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM topics t WHERE TRUE");
        push_filters(&mut builder, query);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn find_topic_view(&self, id: &Uuid) -> Result<Option<TopicView>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(TOPIC_VIEW);
        builder.push(" AND t.id = ").push_bind(*id);

        builder
            .build_query_as::<TopicView>()
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }
}
