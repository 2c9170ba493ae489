use daybook_core::db::EntityStore;
use daybook_core::models::EntityPatch;
use daybook_core::{EntryContent, JournalEntity};

use crate::commands::common::{
    capture_editor_input_with_initial, content_text, replace_content_text, resolve_entry,
    AppContext,
};
use crate::error::CliError;

/// Field changes requested on the command line
#[derive(Debug, Default)]
pub struct EditRequest {
    pub title: Option<String>,
    pub rating: Option<u8>,
    /// `Some(vec![])` clears every tag
    pub tags: Option<Vec<String>>,
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub completed: Option<bool>,
}

impl EditRequest {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.rating.is_none()
            && self.tags.is_none()
            && self.favorite.is_none()
            && self.archived.is_none()
            && self.completed.is_none()
    }

    /// Turn the flags into a patch against `entity`
    pub fn into_patch(self, entity: &JournalEntity) -> Result<EntityPatch, CliError> {
        let kind = entity.entity_type().as_str();
        if self.rating.is_some() && !matches!(entity.content, EntryContent::Mood { .. }) {
            return Err(CliError::FieldMismatch("rating", kind));
        }
        if self.completed.is_some() && !matches!(entity.content, EntryContent::Goal { .. }) {
            return Err(CliError::FieldMismatch("completed", kind));
        }
        let content = match &entity.content {
            EntryContent::Mood { notes, .. } => self.rating.map(|rating| EntryContent::Mood {
                rating,
                notes: notes.clone(),
            }),
            EntryContent::Goal { description, .. } => {
                self.completed.map(|completed| EntryContent::Goal {
                    description: description.clone(),
                    completed,
                })
            }
            _ => None,
        };

        Ok(EntityPatch {
            title: self.title.map(|title| title.trim().to_string()),
            content,
            tags: self.tags,
            is_favorite: self.favorite,
            is_archived: self.archived,
        })
    }
}

pub fn run_edit(ctx: &AppContext, id: &str, request: EditRequest) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let entity = resolve_entry(&store, &ctx.user_id, id)?;

    let patch = if request.is_empty() {
        let current = content_text(&entity.content);
        let edited = match capture_editor_input_with_initial(&current)? {
            Some(text) => text,
            None if matches!(entity.content, EntryContent::Mood { .. }) => String::new(),
            None => return Err(CliError::EmptyEditedContent),
        };
        if edited == current {
            println!("{}", entity.id);
            return Ok(());
        }
        EntityPatch {
            content: Some(replace_content_text(&entity.content, &edited)?),
            ..EntityPatch::default()
        }
    } else {
        request.into_patch(&entity)?
    };

    let updated = store.update(&ctx.user_id, &entity.id, patch)?;
    println!("{}", updated.id);
    Ok(())
}
