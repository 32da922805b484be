// src/tasks/playback_watchdog.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use memequeue_common::models::activation::EndReason;
use memequeue_common::traits::repository_traits::ActivationRepository;
use crate::db::Database;
use crate::services::queue::QueueCoordinator;
use crate::Error;

/// Extra wall-clock time beyond a clip's declared duration before the
/// watchdog force-closes it.
pub const TIMEOUT_GRACE_MS: i64 = 15_000;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns a background task that periodically closes `playing` activations
/// whose playback has run far past the clip's declared duration (an overlay
/// that crashed or never reported completion). The coordinator itself has no
/// timers; this is the caller-side watchdog it expects.
pub fn spawn_playback_watchdog(
    db: Database,
    activation_repo: Arc<dyn ActivationRepository + Send + Sync>,
    coordinator: Arc<QueueCoordinator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = run_watchdog_sweep(&db, activation_repo.as_ref(), &coordinator).await
            {
                error!("Playback watchdog sweep failed: {:?}", e);
            }
        }
    })
}

/// One sweep: find overdue `playing` rows and force-close each with the
/// `timeout` reason. A failure on one channel is logged and does not stop
/// the rest of the sweep.
pub async fn run_watchdog_sweep(
    db: &Database,
    activation_repo: &(dyn ActivationRepository + Send + Sync),
    coordinator: &QueueCoordinator,
) -> Result<(), Error> {
    let mut conn = db.pool().acquire().await?;
    let overdue = activation_repo
        .list_overdue_playing(&mut conn, TIMEOUT_GRACE_MS)
        .await?;
    drop(conn);

    for act in overdue {
        debug!(
            "watchdog: activation {} on channel {} overdue, forcing timeout",
            act.activation_id, act.channel_id
        );
        match coordinator
            .finish_current(act.channel_id, EndReason::Timeout, None)
            .await
        {
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "watchdog: failed to time out activation {} on channel {}: {:?}",
                    act.activation_id, act.channel_id, e
                );
            }
        }
    }
    Ok(())
}
