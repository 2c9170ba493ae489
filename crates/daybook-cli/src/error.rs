use std::io;

use daybook_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] daybook_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry text provided")]
    EmptyContent,
    #[error("Edited entry text cannot be empty")]
    EmptyEditedContent,
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("{0}")]
    AmbiguousEntryId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Mood entries need --rating between 1 and 5")]
    MissingRating,
    #[error("--{0} does not apply to {1} entries")]
    FieldMismatch(&'static str, &'static str),
    #[error(
        "Sync is not configured. Set api_base_url in the config file or export DAYBOOK_API_URL and DAYBOOK_API_TOKEN."
    )]
    SyncNotConfigured,
}
