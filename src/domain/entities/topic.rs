use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use super::{program::UserSummary, upload::FormFields};
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: Uuid,
    #[serde(rename = "program")]
    pub program_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub sections: Json<Vec<serde_json::Value>>,
    pub publish: bool,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRef {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopicView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub sections: Json<Vec<serde_json::Value>>,
    pub publish: bool,
    pub program: Json<ProgramRef>,
    pub user: Json<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TopicInsert {
    pub id: Uuid,
    pub program_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub sections: Vec<serde_json::Value>,
    pub publish: bool,
    pub user_id: Uuid,
}

#[derive(Debug, Default, Clone, PartialEq, Validate)]
pub struct TopicFields {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description cannot exceed 5000 characters"))]
    pub description: Option<String>,

    pub publish: Option<bool>,

    pub sections: Option<Vec<serde_json::Value>>,
}

impl TryFrom<&FormFields> for TopicFields {
    type Error = AppError;

    fn try_from(fields: &FormFields) -> Result<Self, Self::Error> {
        Ok(TopicFields {
            title: fields.get("title").map(|t| t.trim().to_string()),
            description: fields.get("description").map(|d| d.trim().to_string()),
            publish: fields.flag("publish")?,
            sections: fields.json::<Vec<serde_json::Value>>("sections")?,
        })
    }
}

impl TopicFields {
    pub fn into_insert(
        self,
        id: Uuid,
        program_id: Uuid,
        user_id: Uuid,
        photo: Option<String>,
    ) -> Result<TopicInsert, AppError> {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::invalid("title", "Please add a title"))?;

        Ok(TopicInsert {
            id,
            program_id,
            title,
            description: self.description.filter(|d| !d.is_empty()),
            photo,
            sections: self.sections.unwrap_or_default(),
            publish: self.publish.unwrap_or(false),
            user_id,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TopicChanges {
    pub fields: TopicFields,
    pub photo: Option<String>,
}

impl TopicChanges {
    pub fn is_empty(&self) -> bool {
        self.photo.is_none() && self.fields == TopicFields::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicQuery {
    pub program: Option<Uuid>,
    pub owner: Option<Uuid>,
    pub published_only: bool,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct TopicListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub program: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TopicIdsParams {
    pub ids: String,
}

impl TopicIdsParams {
    /// Parses the comma separated id list, rejecting an empty list or a malformed id.
    pub fn parse(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = self
            .ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Uuid::parse_str(s).map_err(|_| AppError::invalid("ids", format!("Invalid id: {}", s))))
            .collect::<Result<Vec<_>, _>>()?;

        if ids.is_empty() {
            return Err(AppError::invalid("ids", "At least one topic id is required"));
        }
        Ok(ids)
    }
}
