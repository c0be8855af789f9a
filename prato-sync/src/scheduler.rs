//! Interval driver for the scheduled reconciliation pass

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::scanner::run_scheduled_pass;
use crate::AppState;

/// Spawn the scheduled pass loop
///
/// The first pass runs immediately. Failures are logged and the loop keeps
/// going; the next tick is the retry.
pub fn spawn_scheduler(
    state: AppState,
    period: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Scheduled sync started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = run_scheduled_pass(&state).await {
                        error!(error = %e, "Scheduled sync failed");
                    }
                }
            }
        }

        info!("Scheduled sync stopped");
    })
}
