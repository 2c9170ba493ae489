//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        apply(conn, 2, MIGRATION_V2)?;
    }
    if version < 3 {
        apply(conn, 3, MIGRATION_V3)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Run one migration script and record its version atomically
fn apply(conn: &mut Connection, version: i32, script: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(script)?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}

/// Version 1: entity table and local settings
const MIGRATION_V1: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS entities (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        is_favorite INTEGER NOT NULL DEFAULT 0,
        is_archived INTEGER NOT NULL DEFAULT 0,
        sync_status TEXT NOT NULL,
        local_version INTEGER NOT NULL,
        server_version INTEGER NOT NULL DEFAULT 0,
        server_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        synced_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_entities_user_updated ON entities(user_id, updated_at DESC);
    CREATE INDEX IF NOT EXISTS idx_entities_user_status ON entities(user_id, sync_status);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_server_id
        ON entities(user_id, server_id) WHERE server_id IS NOT NULL;

    CREATE TRIGGER IF NOT EXISTS entities_version_guard BEFORE UPDATE ON entities
    FOR EACH ROW
    WHEN NEW.local_version < OLD.local_version OR NEW.server_version < OLD.server_version
    BEGIN
        SELECT RAISE(ABORT, 'entity versions cannot decrease');
    END;

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Version 2: sync cursors and the diagnostic sync log
const MIGRATION_V2: &str = "
    CREATE TABLE IF NOT EXISTS sync_cursors (
        user_id TEXT PRIMARY KEY,
        cursor INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sync_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id TEXT NOT NULL,
        direction TEXT NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sync_log_timestamp ON sync_log(timestamp DESC);
";

/// Version 3: remote-reported version, kept apart from the acknowledged one
const MIGRATION_V3: &str = "
    ALTER TABLE entities ADD COLUMN remote_version INTEGER NOT NULL DEFAULT 0;
    UPDATE entities SET remote_version = server_version;
";

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_version_guard_rejects_decreasing_versions() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO entities (id, user_id, entity_type, title, content, sync_status,
                                   local_version, created_at, updated_at)
             VALUES ('e1', 'u1', 'journal', 't', '{}', 'local', 3, 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "UPDATE entities SET local_version = 2 WHERE id = 'e1'",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_v2_creates_sync_log_table() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'sync_log'
                )",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(exists);
    }

    #[test]
    fn test_migration_v3_backfills_remote_version() {
        let mut conn = setup();
        apply(&mut conn, 1, MIGRATION_V1).unwrap();
        apply(&mut conn, 2, MIGRATION_V2).unwrap();
        conn.execute(
            "INSERT INTO entities (id, user_id, entity_type, title, content, sync_status,
                                   local_version, server_version, created_at, updated_at)
             VALUES ('e1', 'u1', 'journal', 't', '{}', 'synced', 4, 4, 0, 0)",
            [],
        )
        .unwrap();

        run(&mut conn).unwrap();

        let remote_version: i64 = conn
            .query_row("SELECT remote_version FROM entities WHERE id = 'e1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(remote_version, 4);
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }
}
