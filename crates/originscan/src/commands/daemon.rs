//! Long-running scheduler: scan every enabled organization on an
//! interval until Ctrl-C.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::DaemonArgs;
use crate::error::CliError;

use super::Context;

pub async fn handle(ctx: &Context, args: DaemonArgs) -> Result<(), CliError> {
    let period = args
        .interval
        .map_or_else(|| ctx.config.scan_interval(), |secs| Duration::from_secs(secs.max(1)));
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, stopping");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        });
    }

    ctx.note(format!(
        "Scanning enabled organizations every {}s (Ctrl-C to stop)",
        period.as_secs()
    ));

    // Every scan checkpoint, the final one included, is flushed to the
    // state file by the store itself.
    ctx.service.run_periodic(period, cancel).await;

    ctx.persist()?;
    info!("scheduler stopped");
    Ok(())
}
