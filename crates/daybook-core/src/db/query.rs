//! List filters, ordering and paging for the entity store

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::models::{EntityType, SyncStatus};

/// Field filters; `None` means "don't care"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    pub entity_type: Option<EntityType>,
    pub tag: Option<String>,
    pub is_favorite: Option<bool>,
    pub is_archived: Option<bool>,
    pub sync_status: Option<SyncStatus>,
    /// Case-insensitive substring match on title and content
    pub text: Option<String>,
    /// Leading characters of the entity id
    pub id_prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Full list request: filter, sort and page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub filter: EntityFilter,
    pub sort: SortOrder,
    pub page: Page,
}

impl ListQuery {
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.page.limit = limit;
        self
    }

    /// Render the WHERE/ORDER/LIMIT tail and its bound values.
    ///
    /// The first bound value is always the owning user id.
    pub(crate) fn to_sql(&self, user_id: &str) -> (String, Vec<Value>) {
        let mut clauses = vec!["user_id = ?".to_string()];
        let mut values = vec![Value::Text(user_id.to_string())];
        let filter = &self.filter;

        if let Some(entity_type) = filter.entity_type {
            clauses.push("entity_type = ?".into());
            values.push(Value::Text(entity_type.as_str().into()));
        }
        if let Some(tag) = filter.tag.as_deref() {
            clauses.push(
                "EXISTS (SELECT 1 FROM json_each(entities.tags) WHERE json_each.value = ?)".into(),
            );
            values.push(Value::Text(tag.trim().trim_start_matches('#').to_lowercase()));
        }
        if let Some(is_favorite) = filter.is_favorite {
            clauses.push("is_favorite = ?".into());
            values.push(Value::Integer(i64::from(is_favorite)));
        }
        if let Some(is_archived) = filter.is_archived {
            clauses.push("is_archived = ?".into());
            values.push(Value::Integer(i64::from(is_archived)));
        }
        if let Some(status) = filter.sync_status {
            clauses.push("sync_status = ?".into());
            values.push(Value::Text(status.as_str().into()));
        }
        if let Some(text) = filter
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            let pattern = format!("%{}%", escape_like(text));
            // LIKE is case-insensitive for ASCII in SQLite
            clauses.push("(title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')".into());
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }

        if let Some(prefix) = filter
            .id_prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
        {
            clauses.push("id LIKE ? ESCAPE '\\'".into());
            values.push(Value::Text(format!("{}%", escape_like(prefix))));
        }

        let column = match self.sort.field {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title COLLATE NOCASE",
        };
        let direction = match self.sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let sql = format!(
            "WHERE {} ORDER BY {column} {direction}, id {direction} LIMIT ? OFFSET ?",
            clauses.join(" AND ")
        );
        values.push(Value::Integer(self.page.limit as i64));
        values.push(Value::Integer(self.page.offset as i64));
        (sql, values)
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
