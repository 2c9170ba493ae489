//! Journal entity model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::content::{EntityType, EntryContent};
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// A unique identifier for an entity, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new unique entity ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where an entity stands relative to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synced
    Local,
    /// Synced before, has unsynced local edits
    Pending,
    /// Matches the last known remote state
    Synced,
    /// Reserved for an in-progress resolution; never persisted by the engine
    Conflict,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
        }
    }

    /// Local state not yet acknowledged by the remote store
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Local | Self::Pending)
    }

    /// Status after a local mutation
    #[must_use]
    pub const fn after_local_edit(self) -> Self {
        match self {
            Self::Local => Self::Local,
            Self::Pending | Self::Synced | Self::Conflict => Self::Pending,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "conflict" => Ok(Self::Conflict),
            other => Err(Error::InvalidInput(format!("unknown sync status '{other}'"))),
        }
    }
}

/// A journal entry tracked by the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntity {
    /// Local identifier, stable for the entity's lifetime
    pub id: EntityId,
    /// Owning user
    pub user_id: String,
    pub title: String,
    /// Type-specific body; also determines the entity type
    pub content: EntryContent,
    pub tags: BTreeSet<String>,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub sync_status: SyncStatus,
    /// Incremented on every local mutation (create = 1)
    pub local_version: i64,
    /// Last version acknowledged by the remote store (0 until first sync)
    pub server_version: i64,
    /// The remote store's own version of the record as it last reported it.
    /// Uploads are based on it and the echo check compares against it.
    #[serde(default)]
    pub remote_version: i64,
    /// Identifier assigned by the remote store
    pub server_id: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Last successful reconciliation (Unix ms)
    pub synced_at: Option<i64>,
}

impl JournalEntity {
    /// Build a never-synced entity from user input
    pub fn new(user_id: impl Into<String>, input: NewEntity) -> Result<Self> {
        input.content.validate()?;
        let now = unix_millis_now();
        Ok(Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            title: input.title.trim().to_string(),
            content: input.content,
            tags: normalize_tags(input.tags)?,
            is_favorite: input.is_favorite,
            is_archived: input.is_archived,
            sync_status: SyncStatus::Local,
            local_version: 1,
            server_version: 0,
            remote_version: 0,
            server_id: None,
            created_at: now,
            updated_at: now,
            synced_at: None,
        })
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.content.entity_type()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.sync_status.is_dirty()
    }

    /// Apply a user edit: new fields, bumped version, refreshed `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn apply_patch(&mut self, patch: EntityPatch, now: i64) -> Result<()> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("update contains no changes".into()));
        }
        if let Some(content) = &patch.content {
            content.validate()?;
        }

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags)?;
        }
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(is_archived) = patch.is_archived {
            self.is_archived = is_archived;
        }

        self.local_version += 1;
        self.updated_at = now.max(self.updated_at + 1);
        self.sync_status = self.sync_status.after_local_edit();
        Ok(())
    }

    /// Get the title, or the first line of the content when untitled
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.is_empty() {
            self.content.summary()
        } else {
            self.title.clone()
        };
        source
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

/// User input for a new entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub title: String,
    pub content: EntryContent,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
}

impl NewEntity {
    pub fn new(title: impl Into<String>, content: EntryContent) -> Self {
        Self {
            title: title.into(),
            content,
            tags: Vec::new(),
            is_favorite: false,
            is_archived: false,
        }
    }

    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub title: Option<String>,
    pub content: Option<EntryContent>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
    pub is_archived: Option<bool>,
}

impl EntityPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.is_favorite.is_none()
            && self.is_archived.is_none()
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Normalize a tag list into a set
///
/// Tags are trimmed, stripped of a leading `#`, lowercased, and must match
/// `[a-z0-9][a-z0-9_-]*`. Empty entries are dropped.
///
/// # Examples
///
/// ```
/// use daybook_core::models::normalize_tags;
///
/// let tags = normalize_tags(vec!["#Work".to_string(), "work".to_string()]).unwrap();
/// assert_eq!(tags.len(), 1);
/// assert!(tags.contains("work"));
/// ```
pub fn normalize_tags<I>(tags: I) -> Result<BTreeSet<String>>
where
    I: IntoIterator<Item = String>,
{
    let re = Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("Invalid regex");
    let mut normalized = BTreeSet::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if !re.is_match(&tag) {
            return Err(Error::InvalidInput(format!("invalid tag '{tag}'")));
        }
        normalized.insert(tag);
    }
    Ok(normalized)
}
