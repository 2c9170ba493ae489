use daybook_core::{EntryContent, JournalEntity};

use crate::commands::common::{
    content_text, format_sync_timestamp, render_tags, resolve_entry, AppContext,
};
use crate::error::CliError;

pub fn run_show(ctx: &AppContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let entity = resolve_entry(&store, &ctx.user_id, id)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entity)?);
    } else {
        for line in format_entry_detail(&entity) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_entry_detail(entity: &JournalEntity) -> Vec<String> {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut lines = vec![
        format!("id:       {}", entity.id),
        format!("type:     {}", entity.entity_type()),
    ];
    if !entity.title.is_empty() {
        lines.push(format!("title:    {}", entity.title));
    }
    if !entity.tags.is_empty() {
        lines.push(format!("tags:     {}", render_tags(entity)));
    }
    lines.push(format!(
        "flags:    favorite={} archived={}",
        yes_no(entity.is_favorite),
        yes_no(entity.is_archived)
    ));
    lines.push(format!(
        "sync:     {} (local v{}, server v{})",
        entity.sync_status, entity.local_version, entity.server_version
    ));
    lines.push(format!("created:  {}", format_sync_timestamp(entity.created_at)));
    lines.push(format!("updated:  {}", format_sync_timestamp(entity.updated_at)));
    lines.push(format!(
        "synced:   {}",
        entity
            .synced_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    ));

    let body = match &entity.content {
        EntryContent::Journal { .. } | EntryContent::Gratitude { .. } => {
            content_text(&entity.content)
        }
        other => other.summary(),
    };
    if !body.is_empty() {
        lines.push(String::new());
        lines.extend(body.lines().map(ToString::to_string));
    }
    lines
}
