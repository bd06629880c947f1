// fraudgate/src/reaper.rs
//
// Periodic reaper — runs RiskSignalStore::cleanup on a fixed interval.
//
// The reaper only runs inside a tokio runtime (the server process). Starting
// it anywhere else fails with RiskError::NoRuntime instead of silently doing
// nothing. The returned handle owns the task: `stop().await` shuts it down
// and joins it, and dropping the handle signals shutdown as well.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, RiskError};
use crate::state::RiskSignalStore;

pub struct ReaperHandle {
    shutdown: Option<watch::Sender<bool>>,
    task:     Option<JoinHandle<()>>,
}

impl ReaperHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Reaper task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
    }
}

/// Start sweeping `store` every `interval`. The first sweep happens one
/// interval after start.
pub fn start_reaper(store: Arc<RiskSignalStore>, interval: Duration) -> Result<ReaperHandle> {
    if interval.is_zero() {
        return Err(RiskError::NonPositiveWindow { name: "reaper interval", millis: 0 });
    }
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| RiskError::NoRuntime)?;

    let (tx, mut rx) = watch::channel(false);
    let task = runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = store.cleanup();
                    if report.total() > 0 {
                        info!(
                            "Reaper evicted {} entries (rate={} devices={} logins={} signups={} checkouts={})",
                            report.total(), report.rate_limits, report.devices,
                            report.failed_logins, report.account_creations, report.checkout_attempts
                        );
                    }
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() { break; }
                }
            }
        }
        debug!("Reaper stopped");
    });

    info!("Reaper started (interval={}s)", interval.as_secs());
    Ok(ReaperHandle { shutdown: Some(tx), task: Some(task) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::clock::ManualClock;
    use crate::config::RiskConfig;
    use crate::workers::{is_rate_limited, RateLimit};

    fn store() -> (Arc<ManualClock>, Arc<RiskSignalStore>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 8, 9, 0, 0).unwrap()));
        let store = RiskSignalStore::with_config(RiskConfig::default(), clock.clone()).unwrap();
        (clock, Arc::new(store))
    }

    #[test]
    fn refuses_to_start_outside_a_runtime() {
        let (_, s) = store();
        assert!(matches!(start_reaper(s, Duration::from_secs(60)), Err(RiskError::NoRuntime)));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let (_, s) = store();
        assert!(matches!(
            start_reaper(s, Duration::ZERO),
            Err(RiskError::NonPositiveWindow { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_every_interval_until_stopped() {
        let (clock, s) = store();
        is_rate_limited(&s, "1.2.3.4", "login", RateLimit::default()).unwrap();
        clock.advance(chrono::Duration::minutes(5));

        let handle = start_reaper(Arc::clone(&s), Duration::from_secs(60)).unwrap();
        assert!(handle.is_running());
        assert_eq!(s.stats().sweeps, 0);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(s.stats().sweeps, 1);
        assert!(s.rate_limit("1.2.3.4", "login").is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(s.stats().sweeps, 2);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(s.stats().sweeps, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let (_, s) = store();
        let handle = start_reaper(Arc::clone(&s), Duration::from_secs(30)).unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(s.stats().sweeps, 0);
    }
}
