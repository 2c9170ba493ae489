use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_net_check(ctx: &AppContext) -> Result<(), CliError> {
    let monitor = ctx.monitor()?;
    monitor.check_now().await;
    println!("{}", monitor.state());
    Ok(())
}

pub async fn run_net_quality(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let monitor = ctx.monitor()?;
    let quality = monitor.test_quality().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&quality)?);
    } else if let Some(latency_ms) = quality.latency_ms {
        println!("{} ({latency_ms} ms)", quality.tier);
    } else {
        println!("{}", quality.tier);
    }
    Ok(())
}
