//! Remote store boundary: wire types, error taxonomy and client traits.

mod http;
#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeSet;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntityId, EntityType, EntryContent, JournalEntity, SyncStatus};

pub use http::{CredentialProvider, HttpRemoteStore, StaticCredentials};

/// Failures talking to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Request timed out")]
    Timeout,
    /// Bearer credential missing or rejected
    #[error("Credentials rejected: {0}")]
    Unauthorized(String),
    /// The remote holds a revision this device has not seen yet
    #[error("Remote conflict: {0}")]
    Conflict(String),
    /// Validation failure or other permanent refusal
    #[error("Remote rejected request: {message} ({status})")]
    Rejected { status: u16, message: String },
    /// Server-side failure or throttling
    #[error("Remote unavailable: {message} ({status})")]
    Unavailable { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

impl RemoteError {
    /// Transient failures are worth retrying; rejections are not
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout | Self::Unavailable { .. }
        )
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else if error.is_builder() {
            Self::InvalidConfiguration(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A revision as the remote store knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub server_id: String,
    /// Local id of the device that created the record
    #[serde(default)]
    pub client_id: Option<EntityId>,
    pub user_id: String,
    pub title: String,
    pub content: EntryContent,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub server_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteRecord {
    /// Materialize as a synced local entity with the given local id
    #[must_use]
    pub fn to_entity(&self, id: EntityId, synced_at: i64) -> JournalEntity {
        JournalEntity {
            id,
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            is_favorite: self.is_favorite,
            is_archived: self.is_archived,
            sync_status: SyncStatus::Synced,
            local_version: self.server_version,
            server_version: self.server_version,
            remote_version: self.server_version,
            server_id: Some(self.server_id.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced_at: Some(synced_at),
        }
    }
}

/// Body of a versioned upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    /// Existing remote id; `None` asks the remote to create a record
    #[serde(skip)]
    pub server_id: Option<String>,
    pub client_id: EntityId,
    pub user_id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub title: String,
    pub content: EntryContent,
    pub tags: BTreeSet<String>,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub local_version: i64,
    /// Last remote version this revision was based on; the remote refuses the
    /// write with a conflict when it already holds something newer
    pub base_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UpsertRequest {
    /// Path key of the record: the remote id once known, else the client id
    #[must_use]
    pub fn record_key(&self) -> String {
        self.server_id
            .clone()
            .unwrap_or_else(|| self.client_id.to_string())
    }
}

impl From<&JournalEntity> for UpsertRequest {
    fn from(entity: &JournalEntity) -> Self {
        Self {
            server_id: entity.server_id.clone(),
            client_id: entity.id,
            user_id: entity.user_id.clone(),
            entity_type: entity.entity_type(),
            title: entity.title.clone(),
            content: entity.content.clone(),
            tags: entity.tags.clone(),
            is_favorite: entity.is_favorite,
            is_archived: entity.is_archived,
            local_version: entity.local_version,
            base_version: entity.remote_version,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Remote acknowledgement of an upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAck {
    pub server_id: String,
    pub server_version: i64,
    pub updated_at: i64,
}

/// Versioned data API of the remote store
pub trait RemoteStore: Send + Sync {
    /// Create or update the record at `request.record_key()`
    fn upsert(
        &self,
        request: &UpsertRequest,
    ) -> impl Future<Output = RemoteResult<UpsertAck>> + Send;

    /// All of a user's records updated strictly after `since` (everything when `None`)
    fn list_since(
        &self,
        user_id: &str,
        since: Option<i64>,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteRecord>>> + Send;
}

/// Lightweight connectivity check against the remote store
pub trait LivenessProbe: Send + Sync {
    fn probe(&self) -> impl Future<Output = RemoteResult<()>> + Send;
}
