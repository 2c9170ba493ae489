use daybook_core::db::{EntityFilter, EntityStore, ListQuery, Page, SortOrder};

use crate::cli::{EntryKind, SortKey};
use crate::commands::common::{
    entity_to_list_item, format_entry_lines, AppContext, EntryListItem,
};
use crate::error::CliError;

pub struct ListRequest {
    pub limit: usize,
    pub kind: Option<EntryKind>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub favorites: bool,
    pub archived: bool,
    pub sort: SortKey,
    pub ascending: bool,
}

impl ListRequest {
    /// Most recently updated active entries
    pub const fn recent(limit: usize) -> Self {
        Self {
            limit,
            kind: None,
            tag: None,
            search: None,
            favorites: false,
            archived: false,
            sort: SortKey::Updated,
            ascending: false,
        }
    }

    pub fn to_query(&self) -> ListQuery {
        ListQuery {
            filter: EntityFilter {
                entity_type: self.kind.map(Into::into),
                tag: self.tag.clone(),
                is_favorite: self.favorites.then_some(true),
                is_archived: Some(self.archived),
                text: self.search.clone(),
                ..EntityFilter::default()
            },
            sort: SortOrder {
                field: self.sort.field(),
                direction: SortKey::direction(self.ascending),
            },
            page: Page {
                limit: self.limit,
                offset: 0,
            },
        }
    }
}

pub fn run_list(ctx: &AppContext, request: &ListRequest, as_json: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let entities = store.list(&ctx.user_id, &request.to_query())?;

    if as_json {
        let json_items = entities
            .iter()
            .map(entity_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entities) {
            println!("{line}");
        }
    }

    Ok(())
}
