//! daybook-core - Core library for Daybook
//!
//! Offline-first journal storage and the engine that reconciles it with a
//! remote store: the local entity store, network liveness monitoring,
//! last-writer-wins conflict resolution, the sync cycle and its scheduler.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{EntityId, EntityType, EntryContent, JournalEntity, SyncStatus};
