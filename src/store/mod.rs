//! Template persistence.
//!
//! Templates are soft-deleted: a row with `deleted_at` set is invisible to
//! every read and write path.

mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

pub use self::postgres::{PgTemplateStore, PostgresDriver, TEMPLATES_SCHEMA};

/// Longest title the `templates` table accepts.
pub const MAX_TITLE_LEN: usize = 255;

/// A stored template row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    pub user_id: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Fields supplied when creating a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    pub user_id: i32,
}

impl NewTemplate {
    /// Build from optional request fields. Both are required.
    pub fn from_parts(title: Option<String>, user_id: Option<i32>) -> Result<Self, StoreError> {
        match (title, user_id) {
            (Some(title), Some(user_id)) => {
                validate_title(&title)?;
                validate_user_id(user_id)?;
                Ok(Self { title, user_id })
            }
            _ => Err(StoreError::Validation(
                "title and user_id are required".to_string(),
            )),
        }
    }
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TemplateChanges {
    pub title: Option<String>,
    pub user_id: Option<i32>,
}

impl TemplateChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.user_id.is_none()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::Validation(
                "at least one of title or user_id is required".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(user_id) = self.user_id {
            validate_user_id(user_id)?;
        }
        Ok(())
    }
}

fn validate_user_id(user_id: i32) -> Result<(), StoreError> {
    if user_id <= 0 {
        return Err(StoreError::Validation(
            "user_id must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(StoreError::Validation(format!(
            "title must not exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// Storage operations behind the template endpoints.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Insert a template under a fresh id and return the stored row.
    async fn create(&self, template: &NewTemplate) -> Result<Template, StoreError>;

    /// All templates that have not been soft-deleted.
    async fn list_active(&self) -> Result<Vec<Template>, StoreError>;

    /// Apply `changes` to a live template and bump `updated_at`.
    async fn update(&self, id: Uuid, changes: &TemplateChanges) -> Result<(), StoreError>;

    /// Mark a live template as deleted.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;
}
