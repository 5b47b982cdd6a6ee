use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    entities::program::{Program, ProgramChanges, ProgramInsert, ProgramQuery, ProgramView},
    errors::AppError,
    repositories::sqlx_repo::SqlxProgramRepo,
};

const PROGRAM_VIEW: &str = r#"
    SELECT
        p.id, p.title, p.description, p.photo, p.publish, p.created_at, p.updated_at,
        json_build_object('id', u.id, 'name', u.name, 'email', u.email) AS "user",
        COALESCE((
            SELECT json_agg(json_build_object('id', t.id, 'title', t.title, 'alias', t.alias, 'color', t.color) ORDER BY t.title)
            FROM program_types t
            WHERE t.id = ANY(p.types)
        ), '[]'::json) AS types,
        COALESCE((
            SELECT json_agg(json_build_object('id', tp.id, 'title', tp.title, 'description', tp.description, 'photo', tp.photo) ORDER BY tp.created_at)
            FROM topics tp
            WHERE tp.program_id = p.id
        ), '[]'::json) AS topics
    FROM programs p
    JOIN users u ON u.id = p.user_id
    WHERE TRUE"#;

#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Inserts a program under an id chosen by the caller
    async fn insert_program(&self, program: &ProgramInsert) -> Result<Program, AppError>;

    async fn find_program(&self, id: &Uuid) -> Result<Option<Program>, AppError>;

    /// Applies the present fields of `changes`
    async fn update_program(&self, id: &Uuid, changes: &ProgramChanges) -> Result<Program, AppError>;

    /// Overwrites the stored photo name, `None` clears it
    async fn set_program_photo(&self, id: &Uuid, photo: Option<String>) -> Result<(), AppError>;

    /// Deletes the program; its topics and records go with it
    async fn delete_program(&self, id: &Uuid) -> Result<(), AppError>;

    async fn list_programs(&self, query: &ProgramQuery) -> Result<Vec<ProgramView>, AppError>;

    async fn count_programs(&self, query: &ProgramQuery) -> Result<i64, AppError>;

    async fn find_program_view(&self, id: &Uuid) -> Result<Option<ProgramView>, AppError>;

    /// Returns the ids in `ids` that are not known program types
    async fn missing_program_types(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>;
}

impl SqlxProgramRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxProgramRepo { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProgramQuery) {
    if let Some(owner) = query.owner {
        builder.push(" AND p.user_id = ").push_bind(owner);
    }
    if query.published_only {
        builder.push(" AND p.publish = TRUE");
    }
}

#[async_trait]
impl ProgramRepository for SqlxProgramRepo {
    async fn insert_program(&self, program: &ProgramInsert) -> Result<Program, AppError> {
        let created = sqlx::query_as::<_, Program>(
            r#"
            INSERT INTO programs (id, title, description, photo, types, publish, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(program.id)
        .bind(&program.title)
        .bind(&program.description)
        .bind(&program.photo)
        .bind(&program.types)
        .bind(program.publish)
        .bind(program.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_program(&self, id: &Uuid) -> Result<Option<Program>, AppError> {
        sqlx::query_as::<_, Program>("SELECT * FROM programs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn update_program(&self, id: &Uuid, changes: &ProgramChanges) -> Result<Program, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE programs SET updated_at = NOW()");

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
        if let Some(types) = &changes.fields.types {
            builder.push(", types = ").push_bind(types.clone());
        }
        if let Some(photo) = &changes.photo {
            builder.push(", photo = ").push_bind(photo.clone());
        }
        builder.push(" WHERE id = ").push_bind(*id);
        builder.push(" RETURNING *");

        builder
            .build_query_as::<Program>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No program with the id of {}", id)))
    }

    async fn set_program_photo(&self, id: &Uuid, photo: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE programs SET photo = $1, updated_at = NOW() WHERE id = $2")
            .bind(photo)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_program(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("No program with the id of {}", id)));
        }
        Ok(())
    }

    async fn list_programs(&self, query: &ProgramQuery) -> Result<Vec<ProgramView>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(PROGRAM_VIEW);
        push_filters(&mut builder, query);
        builder.push(" ORDER BY p.created_at DESC");
        builder.push(" LIMIT ").push_bind(query.limit);
        builder.push(" OFFSET ").push_bind(query.offset);

        let programs = builder
            .build_query_as::<ProgramView>()
            .fetch_all(&self.pool)
            .await?;

        Ok(programs)
    }

    async fn count_programs(&self, query: &ProgramQuery) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM programs p WHERE TRUE");
        push_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn find_program_view(&self, id: &Uuid) -> Result<Option<ProgramView>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(PROGRAM_VIEW);
        builder.push(" AND p.id = ").push_bind(*id);

        builder
            .build_query_as::<ProgramView>()
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn missing_program_types(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        let missing = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT requested.id
            FROM unnest($1::uuid[]) AS requested(id)
            WHERE NOT EXISTS (SELECT 1 FROM program_types pt WHERE pt.id = requested.id)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(missing)
    }
}
