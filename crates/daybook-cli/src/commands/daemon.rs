use std::sync::Arc;

use daybook_core::sync::SyncScheduler;

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Probe connectivity and sync on schedule until Ctrl-C
pub async fn run_daemon(ctx: &AppContext) -> Result<(), CliError> {
    let engine = ctx.engine()?;
    let monitor = Arc::clone(engine.monitor());

    let online = monitor.check_now().await;
    let probe_loop = monitor.spawn_probe_loop();
    let scheduler = SyncScheduler::spawn(
        Arc::clone(&engine),
        ctx.user_id.clone(),
        ctx.config.sync_interval(),
    );

    if online && engine.auto_sync() {
        scheduler.trigger_now();
    }
    tracing::info!(
        "Daybook daemon running for {} ({}), press Ctrl-C to stop",
        ctx.user_id,
        monitor.state()
    );

    let signal = tokio::signal::ctrl_c().await;
    scheduler.shutdown().await;
    probe_loop.abort();
    signal?;

    tracing::info!("Daybook daemon stopped");
    Ok(())
}
