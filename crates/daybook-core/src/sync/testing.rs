//! Shared fixtures for engine and scheduler tests.

use std::sync::Arc;
use std::time::Duration;

use super::{SyncEngine, SyncEngineConfig};
use crate::db::SqliteEntityStore;
use crate::models::{EntryContent, NewEntity};
use crate::network::{MonitorConfig, NetworkMonitor};
use crate::remote::memory::MemoryRemoteStore;

pub const USER: &str = "user-1";

pub type TestEngine = SyncEngine<SqliteEntityStore, MemoryRemoteStore, MemoryRemoteStore>;

pub struct Harness {
    pub store: Arc<SqliteEntityStore>,
    pub remote: Arc<MemoryRemoteStore>,
    pub monitor: Arc<NetworkMonitor<MemoryRemoteStore>>,
    pub engine: Arc<TestEngine>,
}

impl Harness {
    pub fn online() -> Self {
        Self::build(true, fast_config())
    }

    pub fn offline() -> Self {
        Self::build(false, fast_config())
    }

    pub fn with_config(config: SyncEngineConfig) -> Self {
        Self::build(true, config)
    }

    fn build(online: bool, config: SyncEngineConfig) -> Self {
        let store = Arc::new(SqliteEntityStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = Arc::new(NetworkMonitor::new(
            Arc::clone(&remote),
            MonitorConfig {
                initially_online: online,
                ..MonitorConfig::default()
            },
        ));
        let engine = Arc::new(
            SyncEngine::new(
                Arc::clone(&store),
                Arc::clone(&remote),
                Arc::clone(&monitor),
                config,
            )
            .unwrap(),
        );
        Self {
            store,
            remote,
            monitor,
            engine,
        }
    }
}

/// Default limits without retry delays
pub fn fast_config() -> SyncEngineConfig {
    SyncEngineConfig {
        retry_backoff: Duration::ZERO,
        ..SyncEngineConfig::default()
    }
}

pub fn journal(title: &str) -> NewEntity {
    NewEntity::new(title, EntryContent::journal("x"))
}
