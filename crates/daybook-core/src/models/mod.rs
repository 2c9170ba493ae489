//! Data models for Daybook

mod content;
mod entity;
mod settings;
mod sync_log;

pub use content::{EntityType, EntryContent};
pub use entity::{normalize_tags, EntityId, EntityPatch, JournalEntity, NewEntity, SyncStatus};
pub use settings::SyncSettings;
pub use sync_log::{SyncDirection, SyncLogEntry, SyncLogStatus};
