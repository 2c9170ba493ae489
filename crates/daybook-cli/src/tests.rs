use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use daybook_core::config::SyncConfig;
use daybook_core::db::{EntityStore, SortDirection, SortField};
use daybook_core::models::{NewEntity, SyncDirection, SyncLogEntry, SyncLogStatus};
use daybook_core::sync::{BatchSyncResult, SkipReason, SyncError, SyncErrorKind};
use daybook_core::{EntityType, EntryContent, SyncStatus};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::cli::{Cli, Commands, CompletionShell, EntryKind, SortKey, SyncCommands, Toggle};
use crate::commands::common::{
    build_content, content_text, default_editor, format_batch_result, format_relative_time,
    format_sync_timestamp, normalize_content, normalize_entry_identifier, parse_items,
    replace_content_text, resolve_entry, resolve_user_id, sync_marker, AppContext,
    DEFAULT_USER_ID,
};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::EditRequest;
use crate::commands::list::ListRequest;
use crate::commands::show::format_entry_detail;
use crate::commands::sync::{format_sync_log_lines, run_sync_auto, sync_status_report};
use crate::error::CliError;

fn context(dir: &TempDir) -> AppContext {
    AppContext {
        db_path: dir.path().join("nested").join("daybook.db"),
        config: SyncConfig::default(),
        user_id: "tester".to_string(),
    }
}

fn journal(title: &str) -> NewEntity {
    NewEntity::new(title, EntryContent::journal("notes"))
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn blank_entry_identifier_is_rejected() {
    assert!(matches!(
        normalize_entry_identifier("   "),
        Err(CliError::EmptyEntryId)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_is_utc() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn parse_items_splits_lines_and_semicolons() {
    assert_eq!(
        parse_items("coffee; sunshine\n\n  a long walk  ;"),
        vec!["coffee", "sunshine", "a long walk"]
    );
}

#[test]
fn build_content_matches_kind() {
    assert_eq!(
        build_content(EntryKind::Journal, "hello", None).unwrap(),
        EntryContent::journal("hello")
    );
    assert_eq!(
        build_content(EntryKind::Mood, "", Some(4)).unwrap(),
        EntryContent::Mood {
            rating: 4,
            notes: String::new()
        }
    );
    assert_eq!(
        build_content(EntryKind::Goal, "Run 5k", None)
            .unwrap()
            .entity_type(),
        EntityType::Goal
    );
}

#[test]
fn build_content_rejects_bad_combinations() {
    assert!(matches!(
        build_content(EntryKind::Mood, "meh", None),
        Err(CliError::MissingRating)
    ));
    assert!(matches!(
        build_content(EntryKind::Journal, "text", Some(3)),
        Err(CliError::FieldMismatch("rating", "journal"))
    ));
    assert!(matches!(
        build_content(EntryKind::Gratitude, " ; ", None),
        Err(CliError::EmptyContent)
    ));
}

#[test]
fn replace_content_text_keeps_other_fields() {
    let goal = EntryContent::Goal {
        description: "Read more".into(),
        completed: true,
    };
    assert_eq!(content_text(&goal), "Read more");
    assert_eq!(
        replace_content_text(&goal, "Read 12 books").unwrap(),
        EntryContent::Goal {
            description: "Read 12 books".into(),
            completed: true,
        }
    );

    let gratitude = EntryContent::Gratitude {
        items: vec!["tea".into(), "rain".into()],
    };
    assert_eq!(content_text(&gratitude), "tea\nrain");
    assert!(matches!(
        replace_content_text(&gratitude, "  "),
        Err(CliError::EmptyEditedContent)
    ));
}

#[test]
fn resolve_entry_by_id_and_prefix() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    let entity = store.create(&ctx.user_id, journal("Morning")).unwrap();
    let id = entity.id.to_string();

    let by_id = resolve_entry(&store, &ctx.user_id, &id).unwrap();
    assert_eq!(by_id.id, entity.id);

    let by_prefix = resolve_entry(&store, &ctx.user_id, &id[..13]).unwrap();
    assert_eq!(by_prefix.id, entity.id);

    assert!(matches!(
        resolve_entry(&store, &ctx.user_id, "ffffffff"),
        Err(CliError::EntryNotFound(_))
    ));
    assert!(matches!(
        resolve_entry(&store, "someone-else", &id),
        Err(CliError::EntryNotFound(_))
    ));
}

#[test]
fn resolve_entry_reports_ambiguous_prefix() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    let first = store.create(&ctx.user_id, journal("One")).unwrap();
    store.create(&ctx.user_id, journal("Two")).unwrap();

    // v7 ids created moments apart share their leading timestamp digits
    let prefix = &first.id.to_string()[..4];
    assert!(matches!(
        resolve_entry(&store, &ctx.user_id, prefix),
        Err(CliError::AmbiguousEntryId(_))
    ));
}

#[test]
fn delete_removes_entry() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    let entity = store.create(&ctx.user_id, journal("Gone soon")).unwrap();

    run_delete(&ctx, &entity.id.to_string()).unwrap();
    assert!(store.get(&ctx.user_id, &entity.id).is_err());
}

#[test]
fn edit_request_checks_entry_kind() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    let page = store.create(&ctx.user_id, journal("Page")).unwrap();
    let goal = store
        .create(
            &ctx.user_id,
            NewEntity::new(
                "",
                EntryContent::Goal {
                    description: "Stretch".into(),
                    completed: false,
                },
            ),
        )
        .unwrap();

    let rating = EditRequest {
        rating: Some(2),
        ..EditRequest::default()
    };
    assert!(matches!(
        rating.into_patch(&page),
        Err(CliError::FieldMismatch("rating", "journal"))
    ));

    let done = EditRequest {
        completed: Some(true),
        favorite: Some(true),
        ..EditRequest::default()
    };
    let patch = done.into_patch(&goal).unwrap();
    assert_eq!(patch.is_favorite, Some(true));
    assert_eq!(
        patch.content,
        Some(EntryContent::Goal {
            description: "Stretch".into(),
            completed: true,
        })
    );

    assert!(EditRequest::default().is_empty());
}

#[test]
fn list_request_defaults_to_active_entries() {
    let query = ListRequest::recent(5).to_query();
    assert_eq!(query.filter.is_archived, Some(false));
    assert_eq!(query.filter.is_favorite, None);
    assert_eq!(query.sort.field, SortField::UpdatedAt);
    assert_eq!(query.sort.direction, SortDirection::Desc);
    assert_eq!(query.page.limit, 5);

    let request = ListRequest {
        kind: Some(EntryKind::Mood),
        favorites: true,
        sort: SortKey::Title,
        ascending: true,
        ..ListRequest::recent(10)
    };
    let query = request.to_query();
    assert_eq!(query.filter.entity_type, Some(EntityType::Mood));
    assert_eq!(query.filter.is_favorite, Some(true));
    assert_eq!(query.sort.field, SortField::Title);
    assert_eq!(query.sort.direction, SortDirection::Asc);
}

#[test]
fn sync_status_counts_unsynced_entries_and_auto_toggle() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    store.create(&ctx.user_id, journal("One")).unwrap();
    store.create(&ctx.user_id, journal("Two")).unwrap();

    let report = sync_status_report(&ctx).unwrap();
    assert_eq!(report.local, 2);
    assert_eq!(report.pending, 0);
    assert_eq!(report.cursor, None);
    assert_eq!(report.remote, None);
    assert!(report.auto_sync);
}

#[test]
fn sync_auto_toggle_goes_through_the_engine() {
    let dir = TempDir::new().unwrap();
    let unconfigured = context(&dir);
    assert!(matches!(
        run_sync_auto(&unconfigured, false),
        Err(CliError::SyncNotConfigured)
    ));

    let mut ctx = context(&dir);
    ctx.config.api_base_url = Some("https://sync.example.com".to_string());
    run_sync_auto(&ctx, false).unwrap();
    assert!(!sync_status_report(&ctx).unwrap().auto_sync);
    assert!(!ctx.engine().unwrap().auto_sync());

    run_sync_auto(&ctx, true).unwrap();
    assert!(ctx.engine().unwrap().auto_sync());
}

#[test]
fn sync_commands_need_a_remote() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    assert!(matches!(ctx.engine(), Err(CliError::SyncNotConfigured)));
    assert!(matches!(ctx.monitor(), Err(CliError::SyncNotConfigured)));
}

#[test]
fn format_batch_result_lines() {
    let skipped = BatchSyncResult {
        skipped: Some(SkipReason::Offline),
        ..BatchSyncResult::default()
    };
    assert_eq!(format_batch_result(&skipped), vec!["Sync skipped: offline"]);

    let partial = BatchSyncResult {
        uploaded: 2,
        downloaded: 1,
        cancelled: true,
        errors: vec![SyncError {
            entity_id: None,
            kind: SyncErrorKind::Unauthorized,
            message: "token expired".into(),
            retryable: false,
        }],
        ..BatchSyncResult::default()
    };
    let lines = format_batch_result(&partial);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Uploaded 2, downloaded 1"));
    assert!(lines[1].contains("Connection lost"));
    assert!(lines[2].contains("unauthorized"));
    assert!(lines[2].contains("token expired"));
}

#[test]
fn format_sync_log_lines_include_errors() {
    let entries = vec![
        SyncLogEntry {
            id: 2,
            entity_id: "0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b".into(),
            direction: SyncDirection::Upload,
            status: SyncLogStatus::Failed,
            error_message: Some("timed out".into()),
            timestamp: 0,
        },
        SyncLogEntry {
            id: 1,
            entity_id: "srv-9".into(),
            direction: SyncDirection::Download,
            status: SyncLogStatus::Success,
            error_message: None,
            timestamp: 0,
        },
    ];
    let lines = format_sync_log_lines(&entries);
    assert!(lines[0].contains("upload"));
    assert!(lines[0].contains("0190a1b2-c3d4"));
    assert!(lines[0].ends_with("timed out"));
    assert!(lines[1].ends_with("srv-9"));
}

#[test]
fn entry_detail_shows_sync_state() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.open_store().unwrap();
    let entity = store
        .create(&ctx.user_id, journal("Lake").with_tags(["outdoors"]))
        .unwrap();

    let lines = format_entry_detail(&entity);
    assert!(lines.iter().any(|line| line == "title:    Lake"));
    assert!(lines.iter().any(|line| line == "tags:     #outdoors"));
    assert!(lines.iter().any(|line| line.starts_with("sync:     local")));
    assert!(lines.iter().any(|line| line == "synced:   never"));
    assert_eq!(lines.last().map(String::as_str), Some("notes"));
    assert_eq!(sync_marker(SyncStatus::Synced), ' ');
}

#[test]
fn user_id_resolution_order() {
    let configured = SyncConfig {
        user_id: Some("from-config".into()),
        ..SyncConfig::default()
    };
    assert_eq!(
        resolve_user_id(Some("cli".into()), &configured),
        "cli".to_string()
    );
    assert_eq!(resolve_user_id(Some("  ".into()), &configured), "from-config");
    assert_eq!(
        resolve_user_id(None, &SyncConfig::default()),
        DEFAULT_USER_ID
    );
}

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parses_sync_auto_toggle() {
    let cli = Cli::try_parse_from(["daybook", "--user", "u1", "sync", "auto", "off"]).unwrap();
    assert_eq!(cli.user.as_deref(), Some("u1"));
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: Some(SyncCommands::Auto { state: Toggle::Off })
        })
    ));
}

#[test]
fn completions_write_to_file() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("daybook.bash");
    run_completions(CompletionShell::Bash, Some(&path)).unwrap();
    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("daybook"));
}
