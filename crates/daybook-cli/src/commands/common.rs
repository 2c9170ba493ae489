use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use daybook_core::config::SyncConfig;
use daybook_core::db::{EntityFilter, EntityStore, ListQuery, SqliteEntityStore};
use daybook_core::network::NetworkMonitor;
use daybook_core::remote::{HttpRemoteStore, StaticCredentials};
use daybook_core::sync::{BatchSyncResult, SkipReason, SyncEngine, SyncError};
use daybook_core::{EntityId, EntryContent, JournalEntity, SyncStatus};
use serde::Serialize;

use crate::cli::EntryKind;
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "DAYBOOK_DB_PATH";
pub const DEFAULT_USER_ID: &str = "local";

pub type CliEngine = SyncEngine<SqliteEntityStore, HttpRemoteStore, HttpRemoteStore>;

/// Everything a command needs to reach local storage and the remote
pub struct AppContext {
    pub db_path: PathBuf,
    pub config: SyncConfig,
    pub user_id: String,
}

impl AppContext {
    pub fn open_store(&self) -> Result<Arc<SqliteEntityStore>, CliError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Arc::new(SqliteEntityStore::open(&self.db_path)?))
    }

    pub fn remote(&self) -> Result<Arc<HttpRemoteStore>, CliError> {
        let base_url = self
            .config
            .api_base_url
            .clone()
            .ok_or(CliError::SyncNotConfigured)?;
        let credentials = Arc::new(StaticCredentials::new(self.config.api_token.clone()));
        Ok(Arc::new(HttpRemoteStore::new(
            base_url,
            credentials,
            self.config.request_timeout(),
            self.config.probe_timeout(),
        )?))
    }

    pub fn monitor(&self) -> Result<Arc<NetworkMonitor<HttpRemoteStore>>, CliError> {
        Ok(Arc::new(NetworkMonitor::new(
            self.remote()?,
            self.config.monitor_config(false),
        )))
    }

    pub fn engine(&self) -> Result<Arc<CliEngine>, CliError> {
        let remote = self.remote()?;
        let monitor = Arc::new(NetworkMonitor::new(
            Arc::clone(&remote),
            self.config.monitor_config(false),
        ));
        let engine = SyncEngine::new(
            self.open_store()?,
            remote,
            monitor,
            self.config.engine_config(),
        )?;
        Ok(Arc::new(engine))
    }
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub entity_type: String,
    pub title: String,
    pub preview: String,
    pub sync_status: SyncStatus,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

pub fn resolve_entry(
    store: &SqliteEntityStore,
    user_id: &str,
    entry_query: &str,
) -> Result<JournalEntity, CliError> {
    let entry_query = normalize_entry_identifier(entry_query)?;

    if let Ok(id) = entry_query.parse::<EntityId>() {
        match store.get(user_id, &id) {
            Ok(entity) => return Ok(entity),
            Err(daybook_core::Error::NotFound(_)) => {}
            Err(error) => return Err(error.into()),
        }
    }

    let query = ListQuery {
        filter: EntityFilter {
            id_prefix: Some(entry_query.clone()),
            ..EntityFilter::default()
        },
        ..ListQuery::default()
    }
    .with_limit(3);
    let mut matches = store.list(user_id, &query)?;

    match matches.len() {
        0 => Err(CliError::EntryNotFound(entry_query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .map(|entity| short_id(&entity.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{entry_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &EntityId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn format_entry_lines(entities: &[JournalEntity]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entities
        .iter()
        .map(|entity| {
            let short_id = short_id(&entity.id);
            let kind = entity.entity_type().as_str();
            let marker = sync_marker(entity.sync_status);
            let preview = entry_preview(entity, 40);
            let relative_time = format_relative_time(entity.updated_at, now_ms);
            let tags = render_tags(entity);

            if tags.is_empty() {
                format!("{short_id:<13}  {kind:<9} {marker} {preview:<40}  {relative_time}")
            } else {
                format!(
                    "{short_id:<13}  {kind:<9} {marker} {preview:<40}  {relative_time:<10}  {tags}"
                )
            }
        })
        .collect()
}

/// One-character hint of how far an entry is from the remote
pub const fn sync_marker(status: SyncStatus) -> char {
    match status {
        SyncStatus::Synced => ' ',
        SyncStatus::Local => '+',
        SyncStatus::Pending => '*',
        SyncStatus::Conflict => '!',
    }
}

pub fn entity_to_list_item(entity: &JournalEntity) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entity.id.to_string(),
        entity_type: entity.entity_type().as_str().to_string(),
        title: entity.title.clone(),
        preview: entry_preview(entity, 80),
        sync_status: entity.sync_status,
        tags: entity.tags.iter().cloned().collect(),
        is_favorite: entity.is_favorite,
        is_archived: entity.is_archived,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
        relative_time: format_relative_time(entity.updated_at, now_ms),
    }
}

pub fn entry_preview(entity: &JournalEntity, max_chars: usize) -> String {
    let first_line = entity.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(entity: &JournalEntity) -> String {
    entity
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

/// Build the body for a new entry of `kind` from free text
pub fn build_content(
    kind: EntryKind,
    text: &str,
    rating: Option<u8>,
) -> Result<EntryContent, CliError> {
    if rating.is_some() && kind != EntryKind::Mood {
        return Err(CliError::FieldMismatch(
            "rating",
            daybook_core::EntityType::from(kind).as_str(),
        ));
    }

    match kind {
        EntryKind::Journal => Ok(EntryContent::journal(text)),
        EntryKind::Mood => Ok(EntryContent::Mood {
            rating: rating.ok_or(CliError::MissingRating)?,
            notes: text.to_string(),
        }),
        EntryKind::Gratitude => {
            let items = parse_items(text);
            if items.is_empty() {
                return Err(CliError::EmptyContent);
            }
            Ok(EntryContent::Gratitude { items })
        }
        EntryKind::Goal => Ok(EntryContent::Goal {
            description: text.to_string(),
            completed: false,
        }),
    }
}

/// Gratitude items: one per line or per `;`
pub fn parse_items(text: &str) -> Vec<String> {
    text.split(['\n', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// The user-editable text of an entry body
pub fn content_text(content: &EntryContent) -> String {
    match content {
        EntryContent::Journal { notes } | EntryContent::Mood { notes, .. } => notes.clone(),
        EntryContent::Gratitude { items } => items.join("\n"),
        EntryContent::Goal { description, .. } => description.clone(),
    }
}

/// Swap the editable text of `content`, keeping its kind and other fields
pub fn replace_content_text(content: &EntryContent, text: &str) -> Result<EntryContent, CliError> {
    match content {
        EntryContent::Journal { .. } => Ok(EntryContent::journal(text)),
        EntryContent::Mood { rating, .. } => Ok(EntryContent::Mood {
            rating: *rating,
            notes: text.to_string(),
        }),
        EntryContent::Gratitude { .. } => {
            let items = parse_items(text);
            if items.is_empty() {
                return Err(CliError::EmptyEditedContent);
            }
            Ok(EntryContent::Gratitude { items })
        }
        EntryContent::Goal { completed, .. } => Ok(EntryContent::Goal {
            description: text.to_string(),
            completed: *completed,
        }),
    }
}

pub fn format_batch_result(result: &BatchSyncResult) -> Vec<String> {
    if let Some(reason) = result.skipped {
        let why = match reason {
            SkipReason::AlreadyRunning => "another sync is already running",
            SkipReason::Offline => "offline",
        };
        return vec![format!("Sync skipped: {why}")];
    }

    let mut lines = vec![format!(
        "Uploaded {}, downloaded {}, resolved {} conflict(s), {} pending ({} ms)",
        result.uploaded,
        result.downloaded,
        result.conflicts_resolved,
        result.pending,
        result.duration_ms
    )];
    if result.cancelled {
        lines.push("Connection lost; remaining work waits for the next sync".to_string());
    }
    lines.extend(result.errors.iter().map(format_sync_error));
    lines
}

pub fn format_sync_error(error: &SyncError) -> String {
    let entity = error
        .entity_id
        .as_ref()
        .map_or_else(|| "-".to_string(), short_id);
    let kind = serde_json::to_value(error.kind)
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_default();
    format!("  {kind:<12} {entity:<13}  {}", error.message)
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Entry text from arguments, then piped stdin, then the editor
pub fn resolve_entry_text(parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_content(&parts.join(" ")) {
        return Ok(text);
    }

    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }

    if let Some(text) = capture_editor_input_with_initial("")? {
        return Ok(text);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let entry_text = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&entry_text))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        // EDITOR may carry arguments, e.g. "code --wait"
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("daybook-entry-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daybook")
        .join("daybook.db")
}

pub fn resolve_user_id(cli_user: Option<String>, config: &SyncConfig) -> String {
    cli_user
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .or_else(|| config.user_id.clone())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}
