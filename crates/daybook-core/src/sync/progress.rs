//! Progress events published while a cycle runs.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Preparing,
    Uploading,
    Downloading,
    RetryingFailed,
    Completed,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preparing => "preparing",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::RetryingFailed => "retrying failed",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub stage: SyncStage,
    /// 1-based position within the stage; 0 for the stage-entered event
    pub current: usize,
    pub total: usize,
    pub current_entity_title: Option<String>,
}

impl SyncProgress {
    #[must_use]
    pub const fn stage(stage: SyncStage, total: usize) -> Self {
        Self {
            stage,
            current: 0,
            total,
            current_entity_title: None,
        }
    }

    #[must_use]
    pub fn entity(stage: SyncStage, current: usize, total: usize, title: &str) -> Self {
        Self {
            stage,
            current,
            total,
            current_entity_title: Some(title.to_string()),
        }
    }
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stage)?;
        if self.total > 0 {
            write!(f, " {}/{}", self.current, self.total)?;
        }
        if let Some(title) = &self.current_entity_title {
            write!(f, " ({title})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_is_compact() {
        assert_eq!(
            SyncProgress::stage(SyncStage::Preparing, 0).to_string(),
            "preparing"
        );
        assert_eq!(
            SyncProgress::entity(SyncStage::Uploading, 2, 5, "Walk").to_string(),
            "uploading 2/5 (Walk)"
        );
    }
}
