//! Background eviction of idle sessions.

use super::SessionManagerRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Periodically purge sessions idle for longer than `idle_timeout`.
///
/// All listed services are swept, not only the ones this process has seen,
/// because other processes may share the store.
pub fn spawn_reaper(
    registry: Arc<SessionManagerRegistry>,
    service_ids: Vec<String>,
    idle_timeout: Duration,
    every: Duration,
) -> JoinHandle<()> {
    info!(
        "Session reaper started (idle timeout {}s, every {}s)",
        idle_timeout.as_secs(),
        every.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let evicted = sweep(&registry, &service_ids, idle_timeout).await;
            if evicted > 0 {
                info!("Session reaper evicted {} idle session(s)", evicted);
            } else {
                debug!("Session reaper found nothing to evict");
            }
        }
    })
}

/// Run one eviction pass and return the number of sessions removed.
pub(crate) async fn sweep(
    registry: &SessionManagerRegistry,
    service_ids: &[String],
    idle_timeout: Duration,
) -> usize {
    let mut evicted = 0;
    for service_id in service_ids {
        match registry.manager(service_id).purge_expired(idle_timeout).await {
            Ok(count) => evicted += count,
            Err(e) => warn!("[{}] Session eviction failed: {}", service_id, e),
        }
    }
    evicted
}
