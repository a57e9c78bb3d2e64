//! Periodic refresh
//!
//! A poller ticks at a fixed interval and refreshes one target per tick.
//! The refresh runs in its own task; a tick that arrives while the previous
//! refresh is still in flight is skipped, so refreshes never overlap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::scope::ViewScope;
use crate::store::Refresh;

/// Clears the in-flight flag when the refresh task ends, panics included
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct PollCounters {
    started: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Handle on a running poller
pub struct PollHandle {
    scope: ViewScope,
    counters: Arc<PollCounters>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Refreshes started so far
    pub fn started(&self) -> u64 {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Ticks dropped because a refresh was still running
    pub fn skipped(&self) -> u64 {
        self.counters.skipped.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::SeqCst)
    }

    /// Stop ticking and tear down the scope; an in-flight result is discarded
    pub async fn stop(self) {
        self.scope.teardown();
        if let Err(e) = self.task.await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }
}

/// Start refreshing `target` every `interval` until `scope` is torn down
///
/// The first refresh happens immediately.
pub fn spawn_poller(target: Arc<dyn Refresh>, interval: Duration, scope: ViewScope) -> PollHandle {
    let counters = Arc::new(PollCounters::default());
    let in_flight = Arc::new(AtomicBool::new(false));

    let task = {
        let counters = counters.clone();
        let scope = scope.clone();
        tokio::spawn(async move {
            info!("Polling {} every {}s", target.name(), interval.as_secs_f64());

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = scope.cancelled() => {
                        debug!("Poller for {} stopping", target.name());
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                if in_flight.swap(true, Ordering::SeqCst) {
                    counters.skipped.fetch_add(1, Ordering::SeqCst);
                    debug!("Skipping {} refresh, previous one still running", target.name());
                    continue;
                }
                counters.started.fetch_add(1, Ordering::SeqCst);

                let target = target.clone();
                let scope = scope.clone();
                let counters = counters.clone();
                let guard = InFlight(in_flight.clone());
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = target.refresh(&scope).await {
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                        warn!("Refreshing {} failed: {}", target.name(), e);
                    }
                });
            }
        })
    };

    PollHandle {
        scope,
        counters,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct SlowTarget {
        delay: Duration,
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl SlowTarget {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Refresh for SlowTarget {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn refresh(&self, _scope: &ViewScope) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_refresh_skips_ticks() {
        let target = Arc::new(SlowTarget::new(Duration::from_millis(250)));
        let handle = spawn_poller(target.clone(), Duration::from_millis(100), ViewScope::new());

        tokio::time::sleep(Duration::from_millis(1050)).await;

        assert_eq!(target.max_running.load(Ordering::SeqCst), 1);
        assert!(handle.skipped() > 0);
        assert_eq!(handle.started() as usize, target.calls.load(Ordering::SeqCst));
        assert!(handle.started() >= 3);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_refresh_runs_every_tick() {
        let target = Arc::new(SlowTarget::new(Duration::from_millis(10)));
        let handle = spawn_poller(target.clone(), Duration::from_millis(100), ViewScope::new());

        tokio::time::sleep(Duration::from_millis(450)).await;

        assert_eq!(handle.skipped(), 0);
        assert_eq!(handle.started(), 5);
        handle.stop().await;
    }

    struct PanickingTarget {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Refresh for PanickingTarget {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn refresh(&self, _scope: &ViewScope) -> Result<(), StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("refresh blew up");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_refresh_does_not_stall_polling() {
        let target = Arc::new(PanickingTarget {
            calls: AtomicUsize::new(0),
        });
        let handle = spawn_poller(target.clone(), Duration::from_millis(100), ViewScope::new());

        tokio::time::sleep(Duration::from_millis(450)).await;

        assert_eq!(handle.skipped(), 0);
        assert_eq!(target.calls.load(Ordering::SeqCst), 5);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling() {
        let target = Arc::new(SlowTarget::new(Duration::from_millis(10)));
        let scope = ViewScope::new();
        let handle = spawn_poller(target.clone(), Duration::from_millis(100), scope.clone());

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop().await;
        let calls = target.calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), calls);
        assert!(!scope.is_active());
    }
}
