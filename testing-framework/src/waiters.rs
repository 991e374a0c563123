// Epoch waiter
//
// Polls the chain until it reports a target epoch. Scenarios use this in
// place of sleeping for a guessed duration before epoch-gated operations.

use crate::orchestrator::Clock;
use crate::rpc::StakingRpc;
use anyhow::{bail, Context, Result};
use log::debug;
use std::time::Duration;

/// Shortest pause between two epoch queries, whatever the caller asks for
pub const MIN_EPOCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait for the chain to reach `target` epoch.
///
/// Returns the epoch observed once it is at or past `target`, immediately if
/// the chain is already there. Sleeps go through `clock`, so under paused
/// tokio time the wait costs no real time.
///
/// `poll_interval` is raised to [`MIN_EPOCH_POLL_INTERVAL`]. `timeout` of
/// `None` waits forever. An RPC error ends the wait at once: there is no retry.
///
/// ```ignore
/// let poll = Duration::from_secs(5);
/// let epoch = wait_for_epoch(&*rpc, &clock, 12, poll, Some(Duration::from_secs(3600))).await?;
/// ```
pub async fn wait_for_epoch<R: StakingRpc + ?Sized>(
    rpc: &R,
    clock: &dyn Clock,
    target: u64,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<u64> {
    let poll_interval = poll_interval.max(MIN_EPOCH_POLL_INTERVAL);
    let start = clock.now();
    loop {
        let epoch = rpc
            .current_epoch()
            .await
            .context("Failed to query current epoch")?;
        if epoch >= target {
            return Ok(epoch);
        }

        let elapsed = clock.now() - start;
        if let Some(limit) = timeout {
            if elapsed >= limit {
                bail!(
                    "Timeout waiting for epoch {} after {:?}, chain is at epoch {}",
                    target,
                    limit,
                    epoch
                );
            }
        }

        debug!("Waiting for epoch {}, chain is at epoch {}", target, epoch);
        let sleep = match timeout {
            // Never sleep past the deadline
            Some(limit) => poll_interval.min(limit - elapsed),
            None => poll_interval,
        };
        clock.sleep(sleep).await;
    }
}
