use daybook_core::db::EntityStore;
use daybook_core::models::NewEntity;

use crate::cli::EntryKind;
use crate::commands::common::{
    build_content, normalize_content, read_piped_stdin, resolve_entry_text, AppContext,
};
use crate::error::CliError;

pub struct AddRequest {
    pub kind: EntryKind,
    pub title: Option<String>,
    pub rating: Option<u8>,
    pub tags: Vec<String>,
    pub favorite: bool,
}

pub fn run_add(
    ctx: &AppContext,
    request: AddRequest,
    text_parts: &[String],
) -> Result<(), CliError> {
    // A mood rating is a complete entry on its own
    let text = if request.kind == EntryKind::Mood {
        match normalize_content(&text_parts.join(" ")) {
            Some(text) => text,
            None => read_piped_stdin()?.unwrap_or_default(),
        }
    } else {
        resolve_entry_text(text_parts)?
    };
    let content = build_content(request.kind, &text, request.rating)?;

    let mut input = NewEntity::new(request.title.unwrap_or_default().trim(), content)
        .with_tags(request.tags);
    input.is_favorite = request.favorite;

    let store = ctx.open_store()?;
    let entity = store.create(&ctx.user_id, input)?;

    println!("{}", entity.id);
    Ok(())
}
