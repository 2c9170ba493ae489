use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use daybook_core::db::{SortDirection, SortField};
use daybook_core::EntityType;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Keep a journal offline and sync it when the network allows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Sync configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Journal owner; overrides the configured user id
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Quick capture: daybook "walked to the lake"
    #[arg(trailing_var_arg = true)]
    pub entry: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new entry
    #[command(alias = "new")]
    Add {
        /// Entry kind
        #[arg(long = "type", value_enum, default_value_t = EntryKind::Journal)]
        kind: EntryKind,
        /// Optional title
        #[arg(short, long)]
        title: Option<String>,
        /// Mood rating from 1 to 5 (mood entries)
        #[arg(long)]
        rating: Option<u8>,
        /// Tag to attach; repeat for several
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Mark as favorite
        #[arg(long)]
        favorite: bool,
        /// Entry text; gratitude items are separated by newlines or ';'
        text: Vec<String>,
    },
    /// List recent entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Filter by entry kind
        #[arg(long = "type", value_enum)]
        kind: Option<EntryKind>,
        /// Filter by tag name
        #[arg(long)]
        tag: Option<String>,
        /// Only entries whose title or text contains this
        #[arg(long)]
        search: Option<String>,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Show archived entries instead of active ones
        #[arg(long)]
        archived: bool,
        /// Sort field
        #[arg(long, value_enum, default_value_t = SortKey::Updated)]
        sort: SortKey,
        /// Oldest first
        #[arg(long)]
        asc: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry in full
    Show {
        /// Entry ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing entry; opens the editor when no field flag is given
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New mood rating (mood entries)
        #[arg(long)]
        rating: Option<u8>,
        /// Replace tags; repeat for several
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Remove every tag
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        /// Set or clear the favorite flag
        #[arg(long, value_name = "BOOL")]
        favorite: Option<bool>,
        /// Archive or restore
        #[arg(long, value_name = "BOOL")]
        archived: Option<bool>,
        /// Mark a goal done or not done
        #[arg(long, value_name = "BOOL")]
        completed: Option<bool>,
    },
    /// Delete an existing entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Reconcile local entries with the remote store
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Inspect connectivity to the remote store
    Net {
        #[command(subcommand)]
        command: NetCommands,
    },
    /// Run the background scheduler until interrupted
    Daemon,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntryKind {
    Journal,
    Mood,
    Gratitude,
    Goal,
}

impl From<EntryKind> for EntityType {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Journal => Self::Journal,
            EntryKind::Mood => Self::Mood,
            EntryKind::Gratitude => Self::Gratitude,
            EntryKind::Goal => Self::Goal,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortKey {
    Created,
    Updated,
    Title,
}

impl SortKey {
    pub const fn field(self) -> SortField {
        match self {
            Self::Created => SortField::CreatedAt,
            Self::Updated => SortField::UpdatedAt,
            Self::Title => SortField::Title,
        }
    }

    pub const fn direction(ascending: bool) -> SortDirection {
        if ascending {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show pending work, cursor and auto-sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent upload and download outcomes
    Log {
        /// Number of log entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn background syncing on or off
    Auto {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Upload a single entry
    One {
        /// Entry ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum NetCommands {
    /// Probe the remote once and report online or offline
    Check,
    /// Measure probe latency and classify it
    Quality {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
