use daybook_core::db::EntityStore;

use crate::commands::common::{resolve_entry, AppContext};
use crate::error::CliError;

pub fn run_delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let entity = resolve_entry(&store, &ctx.user_id, id)?;

    store.delete(&ctx.user_id, &entity.id)?;
    println!("{}", entity.id);
    Ok(())
}
