//! Entity store implementation

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::query::ListQuery;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{EntityId, EntityPatch, JournalEntity, NewEntity, SyncStatus};
use crate::remote::UpsertAck;
use crate::util::unix_millis_now;

/// Trait for journal entity storage operations
///
/// Every user-facing call is scoped by `user_id`; an entity owned by someone
/// else is reported as [`Error::NotFound`].
pub trait EntityStore: Send + Sync {
    /// Create a new, never-synced entity
    fn create(&self, user_id: &str, input: NewEntity) -> Result<JournalEntity>;

    /// Get an entity by ID
    fn get(&self, user_id: &str, id: &EntityId) -> Result<JournalEntity>;

    /// List entities matching a filter, sorted and paged
    fn list(&self, user_id: &str, query: &ListQuery) -> Result<Vec<JournalEntity>>;

    /// Apply a user edit in one read-modify-write transaction
    fn update(&self, user_id: &str, id: &EntityId, patch: EntityPatch) -> Result<JournalEntity>;

    /// Hard delete; returns whether a row was removed
    fn delete(&self, user_id: &str, id: &EntityId) -> Result<bool>;

    /// Entities not yet acknowledged by the remote store, oldest edit first
    fn list_dirty(&self, user_id: &str) -> Result<Vec<JournalEntity>>;

    /// Look up the local counterpart of a remote record
    fn find_by_server_id(&self, user_id: &str, server_id: &str) -> Result<Option<JournalEntity>>;

    /// Write a reconciled record (sync engine only)
    fn apply_remote(&self, entity: &JournalEntity) -> Result<JournalEntity>;

    /// Record a successful upload of `uploaded_version` (sync engine only)
    fn acknowledge_upload(
        &self,
        id: &EntityId,
        uploaded_version: i64,
        ack: &UpsertAck,
    ) -> Result<JournalEntity>;

    /// Record the remote revision a newer local revision supersedes and flag it
    /// for re-upload, without a version bump (sync engine only)
    fn rebase(&self, id: &EntityId, server_id: &str, remote_version: i64) -> Result<JournalEntity>;
}

/// `SQLite` implementation of the store traits
///
/// Cloning is cheap; clones share one connection guarded by a mutex, so each
/// read-modify-write runs as a single critical section and transaction.
#[derive(Clone)]
pub struct SqliteEntityStore {
    db: Arc<Mutex<Database>>,
}

const ENTITY_COLUMNS: &str = "id, user_id, title, content, tags, is_favorite, is_archived, \
     sync_status, local_version, server_version, server_id, created_at, updated_at, synced_at, \
     remote_version";

impl SqliteEntityStore {
    /// Wrap an already opened database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (and migrate) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    fn load(conn: &Connection, id: &EntityId) -> Result<Option<JournalEntity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?");
        Ok(conn
            .query_row(&sql, params![id.as_str()], Self::parse_entity)
            .optional()?)
    }

    fn load_owned(conn: &Connection, user_id: &str, id: &EntityId) -> Result<JournalEntity> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ? AND user_id = ?");
        conn.query_row(&sql, params![id.as_str(), user_id], Self::parse_entity)
            .optional()?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn insert(conn: &Connection, entity: &JournalEntity) -> Result<()> {
        conn.execute(
            "INSERT INTO entities (id, user_id, entity_type, title, content, tags, is_favorite,
                                   is_archived, sync_status, local_version, server_version,
                                   server_id, created_at, updated_at, synced_at, remote_version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.id.as_str(),
                entity.user_id,
                entity.entity_type().as_str(),
                entity.title,
                serde_json::to_string(&entity.content)?,
                serde_json::to_string(&entity.tags)?,
                entity.is_favorite,
                entity.is_archived,
                entity.sync_status.as_str(),
                entity.local_version,
                entity.server_version,
                entity.server_id,
                entity.created_at,
                entity.updated_at,
                entity.synced_at,
                entity.remote_version,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every mutable column of an existing row
    fn write(conn: &Connection, entity: &JournalEntity) -> Result<()> {
        let rows = conn.execute(
            "UPDATE entities SET entity_type = ?, title = ?, content = ?, tags = ?,
                    is_favorite = ?, is_archived = ?, sync_status = ?, local_version = ?,
                    server_version = ?, server_id = ?, updated_at = ?, synced_at = ?,
                    remote_version = ?
             WHERE id = ?",
            params![
                entity.entity_type().as_str(),
                entity.title,
                serde_json::to_string(&entity.content)?,
                serde_json::to_string(&entity.tags)?,
                entity.is_favorite,
                entity.is_archived,
                entity.sync_status.as_str(),
                entity.local_version,
                entity.server_version,
                entity.server_id,
                entity.updated_at,
                entity.synced_at,
                entity.remote_version,
                entity.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(entity.id.to_string()));
        }
        Ok(())
    }

    /// Parse an entity from a database row
    fn parse_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntity> {
        let id: String = row.get(0)?;
        let content: String = row.get(3)?;
        let tags: String = row.get(4)?;
        let sync_status: String = row.get(7)?;

        Ok(JournalEntity {
            id: id.parse().map_err(|error| conversion_error(0, error))?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: serde_json::from_str(&content).map_err(|error| conversion_error(3, error))?,
            tags: serde_json::from_str::<BTreeSet<String>>(&tags)
                .map_err(|error| conversion_error(4, error))?,
            is_favorite: row.get(5)?,
            is_archived: row.get(6)?,
            sync_status: sync_status
                .parse::<SyncStatus>()
                .map_err(|error| conversion_error(7, error))?,
            local_version: row.get(8)?,
            server_version: row.get(9)?,
            server_id: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            synced_at: row.get(13)?,
            remote_version: row.get(14)?,
        })
    }
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

impl EntityStore for SqliteEntityStore {
    fn create(&self, user_id: &str, input: NewEntity) -> Result<JournalEntity> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".into()));
        }
        let entity = JournalEntity::new(user_id, input)?;

        let db = self.lock()?;
        Self::insert(db.connection(), &entity)?;
        tracing::debug!("Created entity {} for user {}", entity.id, user_id);
        Ok(entity)
    }

    fn get(&self, user_id: &str, id: &EntityId) -> Result<JournalEntity> {
        let db = self.lock()?;
        Self::load_owned(db.connection(), user_id, id)
    }

    fn list(&self, user_id: &str, query: &ListQuery) -> Result<Vec<JournalEntity>> {
        let (tail, values) = query.to_sql(user_id);
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities {tail}");

        let db = self.lock()?;
        let mut stmt = db.connection().prepare(&sql)?;
        let entities = stmt
            .query_map(params_from_iter(values), Self::parse_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    fn update(&self, user_id: &str, id: &EntityId, patch: EntityPatch) -> Result<JournalEntity> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;

        let mut entity = Self::load_owned(&tx, user_id, id)?;
        entity.apply_patch(patch, unix_millis_now())?;
        Self::write(&tx, &entity)?;
        tx.commit()?;

        tracing::debug!(
            "Updated entity {} to local version {} ({})",
            entity.id,
            entity.local_version,
            entity.sync_status
        );
        Ok(entity)
    }

    fn delete(&self, user_id: &str, id: &EntityId) -> Result<bool> {
        let db = self.lock()?;
        let rows = db.connection().execute(
            "DELETE FROM entities WHERE id = ? AND user_id = ?",
            params![id.as_str(), user_id],
        )?;
        Ok(rows > 0)
    }

    fn list_dirty(&self, user_id: &str) -> Result<Vec<JournalEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities
             WHERE user_id = ? AND sync_status IN ('local', 'pending')
             ORDER BY updated_at ASC, id ASC"
        );

        let db = self.lock()?;
        let mut stmt = db.connection().prepare(&sql)?;
        let entities = stmt
            .query_map(params![user_id], Self::parse_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    fn find_by_server_id(&self, user_id: &str, server_id: &str) -> Result<Option<JournalEntity>> {
        let sql =
            format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE user_id = ? AND server_id = ?");

        let db = self.lock()?;
        Ok(db
            .connection()
            .query_row(&sql, params![user_id, server_id], Self::parse_entity)
            .optional()?)
    }

    fn apply_remote(&self, entity: &JournalEntity) -> Result<JournalEntity> {
        if entity.server_id.is_none() {
            return Err(Error::InvalidInput(format!(
                "remote revision of {} has no server id",
                entity.id
            )));
        }

        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;

        let existing = Self::load(&tx, &entity.id)?;
        if let Some(existing) = &existing {
            if existing.user_id != entity.user_id {
                return Err(Error::NotFound(entity.id.to_string()));
            }
        }

        let floor = existing.as_ref().map_or(0, |row| row.local_version);
        let version = floor.max(entity.server_version).max(entity.local_version);
        let remote_version = existing
            .as_ref()
            .map_or(0, |row| row.remote_version)
            .max(entity.remote_version);
        let reconciled = JournalEntity {
            sync_status: SyncStatus::Synced,
            local_version: version,
            server_version: version,
            remote_version,
            synced_at: Some(entity.synced_at.unwrap_or_else(unix_millis_now)),
            created_at: existing.as_ref().map_or(entity.created_at, |row| row.created_at),
            ..entity.clone()
        };

        if existing.is_some() {
            Self::write(&tx, &reconciled)?;
        } else {
            Self::insert(&tx, &reconciled)?;
        }
        tx.commit()?;
        Ok(reconciled)
    }

    fn acknowledge_upload(
        &self,
        id: &EntityId,
        uploaded_version: i64,
        ack: &UpsertAck,
    ) -> Result<JournalEntity> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;

        let mut entity = Self::load(&tx, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
        entity.server_id = Some(ack.server_id.clone());
        entity.remote_version = entity.remote_version.max(ack.server_version);

        if entity.local_version == uploaded_version {
            let version = entity.local_version.max(ack.server_version);
            entity.local_version = version;
            entity.server_version = version;
            entity.sync_status = SyncStatus::Synced;
            entity.updated_at = ack.updated_at;
            entity.synced_at = Some(unix_millis_now());
        } else {
            // Edited while the upload was in flight; the newer edit still needs uploading
            entity.server_version = entity.server_version.max(ack.server_version);
            entity.sync_status = SyncStatus::Pending;
            tracing::debug!(
                "Entity {} changed during upload (uploaded v{}, now v{}), keeping it pending",
                id,
                uploaded_version,
                entity.local_version
            );
        }

        Self::write(&tx, &entity)?;
        tx.commit()?;
        Ok(entity)
    }

    fn rebase(&self, id: &EntityId, server_id: &str, remote_version: i64) -> Result<JournalEntity> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;

        let mut entity = Self::load(&tx, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
        entity.server_id = Some(server_id.to_string());
        entity.remote_version = entity.remote_version.max(remote_version);
        if entity.sync_status == SyncStatus::Synced {
            entity.sync_status = SyncStatus::Pending;
        }

        Self::write(&tx, &entity)?;
        tx.commit()?;
        Ok(entity)
    }
}
