//! Persisted sync preferences

use serde::{Deserialize, Serialize};

/// Engine preferences that survive restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Whether the scheduler runs cycles on its own
    pub auto_sync: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { auto_sync: true }
    }
}
