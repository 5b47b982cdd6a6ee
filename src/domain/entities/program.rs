use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use super::upload::FormFields;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Program {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub types: Vec<Uuid>,
    pub publish: bool,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgramType {
    pub id: Uuid,
    pub title: String,
    pub alias: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
}

/// A program with its owner, types and topics filled in.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProgramView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub publish: bool,
    pub user: Json<UserSummary>,
    pub types: Json<Vec<ProgramType>>,
    pub topics: Json<Vec<TopicSummary>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProgramInsert {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub types: Vec<Uuid>,
    pub publish: bool,
    pub user_id: Uuid,
}

/// Recognized program fields of a multipart body. Everything is optional so the same shape
/// serves creation and partial updates.
#[derive(Debug, Default, Clone, PartialEq, Validate)]
pub struct ProgramFields {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description cannot exceed 5000 characters"))]
    pub description: Option<String>,

    pub publish: Option<bool>,

    pub types: Option<Vec<Uuid>>,
}

impl TryFrom<&FormFields> for ProgramFields {
    type Error = AppError;

    fn try_from(fields: &FormFields) -> Result<Self, Self::Error> {
        Ok(ProgramFields {
            title: fields.get("title").map(|t| t.trim().to_string()),
            description: fields.get("description").map(|d| d.trim().to_string()),
            publish: fields.flag("publish")?,
            types: fields.json::<Vec<Uuid>>("types")?,
        })
    }
}

impl ProgramFields {
    pub fn into_insert(self, id: Uuid, user_id: Uuid, photo: Option<String>) -> Result<ProgramInsert, AppError> {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::invalid("title", "Please add a title"))?;

        Ok(ProgramInsert {
            id,
            title,
            description: self.description.filter(|d| !d.is_empty()),
            photo,
            types: self.types.unwrap_or_default(),
            publish: self.publish.unwrap_or(false),
            user_id,
        })
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgramChanges {
    pub fields: ProgramFields,
    pub photo: Option<String>,
}

impl ProgramChanges {
    pub fn is_empty(&self) -> bool {
        self.photo.is_none() && self.fields == ProgramFields::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramQuery {
    pub owner: Option<Uuid>,
    pub published_only: bool,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
