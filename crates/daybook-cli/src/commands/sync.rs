use daybook_core::db::{EntityStore, SettingsRepository, SyncLogRepository};
use daybook_core::models::SyncLogEntry;
use daybook_core::sync::{SyncOutcome, SyncStage};
use daybook_core::SyncStatus;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{
    format_batch_result, format_sync_error, format_sync_timestamp, resolve_entry, AppContext,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncStatusReport {
    pub user_id: String,
    pub remote: Option<String>,
    pub auto_sync: bool,
    /// Never uploaded
    pub local: usize,
    /// Uploaded before, edited since
    pub pending: usize,
    pub cursor: Option<i64>,
    pub cursor_iso: Option<String>,
}

/// Run one full cycle, printing progress to stderr
pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    let engine = ctx.engine()?;

    if !engine.monitor().check_now().await {
        let waiting = engine.store().list_dirty(&ctx.user_id)?.len();
        println!("Offline; {waiting} entries waiting to sync");
        return Ok(());
    }

    let mut progress = engine.subscribe_progress();
    let reporter = tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(update) => {
                    eprintln!("{update}");
                    if update.stage == SyncStage::Completed {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = engine.run_cycle(&ctx.user_id).await;
    if result.skipped.is_some() {
        reporter.abort();
    } else if let Err(error) = reporter.await {
        tracing::debug!("Progress reporter ended early: {error}");
    }

    for line in format_batch_result(&result) {
        println!("{line}");
    }
    Ok(())
}

/// Upload a single entry outside a full cycle
pub async fn run_sync_one(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let engine = ctx.engine()?;
    let entity = resolve_entry(engine.store(), &ctx.user_id, id)?;
    engine.monitor().check_now().await;

    let result = engine.sync_one(&ctx.user_id, &entity.id).await?;
    match result.outcome {
        SyncOutcome::Uploaded => println!(
            "{} uploaded (server v{})",
            result.entity.id, result.entity.server_version
        ),
        SyncOutcome::AlreadySynced => println!("{} already synced", result.entity.id),
        SyncOutcome::Skipped(reason) => println!("{} skipped: {reason:?}", result.entity.id),
        SyncOutcome::Failed(error) => println!("{}", format_sync_error(&error).trim_start()),
    }
    Ok(())
}

pub fn sync_status_report(ctx: &AppContext) -> Result<SyncStatusReport, CliError> {
    let store = ctx.open_store()?;
    let dirty = store.list_dirty(&ctx.user_id)?;
    let local = dirty
        .iter()
        .filter(|entity| entity.sync_status == SyncStatus::Local)
        .count();
    let cursor = store.sync_cursor(&ctx.user_id)?;

    Ok(SyncStatusReport {
        user_id: ctx.user_id.clone(),
        remote: ctx.config.api_base_url.clone(),
        auto_sync: store.load_settings()?.auto_sync,
        local,
        pending: dirty.len() - local,
        cursor,
        cursor_iso: cursor.map(format_sync_timestamp),
    })
}

pub fn run_sync_status(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let report = sync_status_report(ctx)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("user:      {}", report.user_id);
    println!(
        "remote:    {}",
        report.remote.as_deref().unwrap_or("not configured")
    );
    println!("auto sync: {}", if report.auto_sync { "on" } else { "off" });
    println!("new:       {}", report.local);
    println!("edited:    {}", report.pending);
    println!(
        "cursor:    {}",
        report.cursor_iso.as_deref().unwrap_or("never downloaded")
    );
    Ok(())
}

pub fn run_sync_log(ctx: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let entries = store.list_sync_log(limit)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sync activity recorded.");
        return Ok(());
    }

    for line in format_sync_log_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_log_lines(entries: &[SyncLogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let short_id = entry.entity_id.chars().take(13).collect::<String>();
            let line = format!(
                "{}  {:<8} {:<7}  {short_id}",
                format_sync_timestamp(entry.timestamp),
                entry.direction.as_str(),
                entry.status.as_str()
            );
            match &entry.error_message {
                Some(message) => format!("{line}  {message}"),
                None => line,
            }
        })
        .collect()
}

/// Toggle auto sync through the engine that honours it
pub fn run_sync_auto(ctx: &AppContext, enabled: bool) -> Result<(), CliError> {
    ctx.engine()?.set_auto_sync(enabled)?;
    println!("Auto sync {}", if enabled { "on" } else { "off" });
    Ok(())
}
