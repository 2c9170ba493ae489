//! Sync log repository

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::params;

use super::SqliteEntityStore;
use crate::error::Result;
use crate::models::{SyncDirection, SyncLogEntry, SyncLogStatus};

/// Trait for the append-only diagnostic sync log
pub trait SyncLogRepository: Send + Sync {
    /// Append one exchange outcome
    fn append_sync_log(
        &self,
        entity_id: &str,
        direction: SyncDirection,
        status: SyncLogStatus,
        error_message: Option<&str>,
        timestamp: i64,
    ) -> Result<()>;

    /// Most recent entries first
    fn list_sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>>;

    /// Delete entries older than `cutoff` (unix ms); returns rows removed
    fn prune_sync_log(&self, cutoff: i64) -> Result<usize>;
}

impl SyncLogRepository for SqliteEntityStore {
    fn append_sync_log(
        &self,
        entity_id: &str,
        direction: SyncDirection,
        status: SyncLogStatus,
        error_message: Option<&str>,
        timestamp: i64,
    ) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO sync_log (entity_id, direction, status, error_message, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            params![
                entity_id,
                direction.as_str(),
                status.as_str(),
                error_message,
                timestamp
            ],
        )?;
        Ok(())
    }

    fn list_sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let db = self.lock()?;
        let mut stmt = db.connection().prepare(
            "SELECT id, entity_id, direction, status, error_message, timestamp
             FROM sync_log
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, entity_id, direction, status, error_message, timestamp)| {
                    Ok(SyncLogEntry {
                        id,
                        entity_id,
                        direction: SyncDirection::parse(&direction)?,
                        status: SyncLogStatus::parse(&status)?,
                        error_message,
                        timestamp,
                    })
                },
            )
            .collect()
    }

    fn prune_sync_log(&self, cutoff: i64) -> Result<usize> {
        let db = self.lock()?;
        let removed = db
            .connection()
            .execute("DELETE FROM sync_log WHERE timestamp < ?", params![cutoff])?;
        if removed > 0 {
            tracing::debug!("Pruned {removed} sync log entries older than {cutoff}");
        }
        Ok(removed)
    }
}
