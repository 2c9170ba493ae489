//! Database layer for Daybook

mod connection;
mod migrations;
mod query;
mod repository;
mod settings_repository;
mod sync_log_repository;

pub use connection::Database;
pub use query::{EntityFilter, ListQuery, Page, SortDirection, SortField, SortOrder};
pub use repository::{EntityStore, SqliteEntityStore};
pub use settings_repository::SettingsRepository;
pub use sync_log_repository::SyncLogRepository;

/// Everything the sync engine needs from local storage
pub trait SyncStore: EntityStore + SettingsRepository + SyncLogRepository {}

impl<T> SyncStore for T where T: EntityStore + SettingsRepository + SyncLogRepository {}
