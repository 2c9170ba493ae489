//! Settings and sync cursor repository

use rusqlite::{params, OptionalExtension};

use super::SqliteEntityStore;
use crate::error::Result;
use crate::models::SyncSettings;

/// Trait for persisted engine state: preferences and per-user download cursors
pub trait SettingsRepository: Send + Sync {
    /// Load settings from the database
    fn load_settings(&self) -> Result<SyncSettings>;

    /// Save settings to the database
    fn save_settings(&self, settings: &SyncSettings) -> Result<()>;

    /// Highest remote `updated_at` applied for this user, if any
    fn sync_cursor(&self, user_id: &str) -> Result<Option<i64>>;

    /// Advance the user's download cursor; never moves it backwards
    fn set_sync_cursor(&self, user_id: &str, cursor: i64) -> Result<()>;
}

impl SettingsRepository for SqliteEntityStore {
    fn load_settings(&self) -> Result<SyncSettings> {
        let mut settings = SyncSettings::default();

        if let Some(value) = self.get_setting("auto_sync")? {
            settings.auto_sync = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(settings)
    }

    fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        self.set_setting(
            "auto_sync",
            if settings.auto_sync { "true" } else { "false" },
        )
    }

    fn sync_cursor(&self, user_id: &str) -> Result<Option<i64>> {
        let db = self.lock()?;
        Ok(db
            .connection()
            .query_row(
                "SELECT cursor FROM sync_cursors WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_sync_cursor(&self, user_id: &str, cursor: i64) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO sync_cursors (user_id, cursor) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET cursor = MAX(cursor, excluded.cursor)",
            params![user_id, cursor],
        )?;
        Ok(())
    }
}

impl SqliteEntityStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let db = self.lock()?;
        Ok(db
            .connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}
