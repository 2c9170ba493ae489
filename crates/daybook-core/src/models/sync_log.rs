//! Sync log model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Which way a record travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
}

impl SyncDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            other => Err(Error::Database(format!("unknown sync direction '{other}'"))),
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a logged exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Success,
    Failed,
}

impl SyncLogStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Database(format!("unknown sync log status '{other}'"))),
        }
    }
}

/// Append-only diagnostic record of one upload or download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Log row identifier
    pub id: i64,
    /// Local entity id, or the remote id when nothing local exists yet
    pub entity_id: String,
    pub direction: SyncDirection,
    pub status: SyncLogStatus,
    pub error_message: Option<String>,
    /// When the exchange finished (unix ms)
    pub timestamp: i64,
}
