//! Daybook CLI - keep a journal from the terminal
//!
//! Entries are written to the local store first; `daybook sync` and
//! `daybook daemon` reconcile them with the remote store when it is reachable.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use daybook_core::config::SyncConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, EntryKind, NetCommands, SyncCommands};
use crate::commands::add::{run_add, AddRequest};
use crate::commands::common::{resolve_db_path, resolve_user_id, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::daemon::run_daemon;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, EditRequest};
use crate::commands::list::{run_list, ListRequest};
use crate::commands::net::{run_net_check, run_net_quality};
use crate::commands::show::run_show;
use crate::commands::sync::{
    run_sync, run_sync_auto, run_sync_log, run_sync_one, run_sync_status,
};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daybook=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref())?;
    let ctx = AppContext {
        db_path: resolve_db_path(cli.db_path),
        user_id: resolve_user_id(cli.user, &config),
        config,
    };

    match cli.command {
        Some(Commands::Add {
            kind,
            title,
            rating,
            tags,
            favorite,
            text,
        }) => {
            let request = AddRequest {
                kind,
                title,
                rating,
                tags,
                favorite,
            };
            run_add(&ctx, request, &text)?;
        }
        Some(Commands::List {
            limit,
            kind,
            tag,
            search,
            favorites,
            archived,
            sort,
            asc,
            json,
        }) => {
            let request = ListRequest {
                limit,
                kind,
                tag,
                search,
                favorites,
                archived,
                sort,
                ascending: asc,
            };
            run_list(&ctx, &request, json)?;
        }
        Some(Commands::Show { id, json }) => run_show(&ctx, &id, json)?,
        Some(Commands::Edit {
            id,
            title,
            rating,
            tags,
            clear_tags,
            favorite,
            archived,
            completed,
        }) => {
            let tags = if clear_tags {
                Some(Vec::new())
            } else {
                Some(tags).filter(|tags| !tags.is_empty())
            };
            let request = EditRequest {
                title,
                rating,
                tags,
                favorite,
                archived,
                completed,
            };
            run_edit(&ctx, &id, request)?;
        }
        Some(Commands::Delete { id }) => run_delete(&ctx, &id)?,
        Some(Commands::Sync { command }) => match command {
            None => run_sync(&ctx).await?,
            Some(SyncCommands::Status { json }) => run_sync_status(&ctx, json)?,
            Some(SyncCommands::Log { limit, json }) => run_sync_log(&ctx, limit, json)?,
            Some(SyncCommands::Auto { state }) => run_sync_auto(&ctx, state.enabled())?,
            Some(SyncCommands::One { id }) => run_sync_one(&ctx, &id).await?,
        },
        Some(Commands::Net { command }) => match command {
            NetCommands::Check => run_net_check(&ctx).await?,
            NetCommands::Quality { json } => run_net_quality(&ctx, json).await?,
        },
        Some(Commands::Daemon) => run_daemon(&ctx).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None if !cli.entry.is_empty() => {
            let request = AddRequest {
                kind: EntryKind::Journal,
                title: None,
                rating: None,
                tags: Vec::new(),
                favorite: false,
            };
            run_add(&ctx, request, &cli.entry)?;
        }
        None => run_list(&ctx, &ListRequest::recent(10), false)?,
    }

    Ok(())
}
