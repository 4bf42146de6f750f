//! Expiry Reaper Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! The task only holds a [`Weak`] reference to what it sweeps, so it never
//! keeps a cache alive on its own. It exits on the first of: an explicit stop
//! signal, the stop sender being dropped, or the swept value being dropped.

use std::sync::Weak;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{self, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// == Reap Seam ==
/// Something the reaper can sweep once per tick.
pub trait Reap: Send + Sync + 'static {
    /// Removes whatever is stale right now and reports what was removed.
    fn reap(&self) -> ReapReport;
}

/// Outcome of a single sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapReport {
    /// Entries removed because their expiration had passed
    pub expired: usize,
    /// Stored values removed because no recency node referenced them
    pub orphaned: usize,
}

impl ReapReport {
    pub fn total(&self) -> usize {
        self.expired + self.orphaned
    }
}

#[derive(Debug)]
enum ReaperHandle {
    /// Spawned onto the caller's tokio runtime
    Task(JoinHandle<()>),
    /// Running on a dedicated thread with its own current-thread runtime
    Thread(thread::JoinHandle<()>),
    /// Could not be started; entries still expire lazily on read
    Unavailable,
}

// == Reaper ==
/// Handle to a running expiry reaper.
#[derive(Debug)]
pub struct Reaper {
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: ReaperHandle,
}

impl Reaper {
    /// Spawns a reaper that sweeps `target` every `interval`.
    ///
    /// Inside a tokio runtime the reaper is spawned as a task on that runtime.
    /// Otherwise it gets its own thread named `cache-reaper`. The first sweep
    /// happens one full interval after spawning.
    ///
    /// `interval` must be non-zero.
    pub fn spawn<T: Reap>(target: Weak<T>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = run(target, interval, stop_rx);

        let handle = match Handle::try_current() {
            Ok(rt) => ReaperHandle::Task(rt.spawn(task)),
            Err(_) => {
                let spawned = thread::Builder::new()
                    .name("cache-reaper".to_string())
                    .spawn(move || {
                        match runtime::Builder::new_current_thread().enable_time().build() {
                            Ok(rt) => rt.block_on(task),
                            Err(err) => warn!(error = %err, "Failed to build reaper runtime"),
                        }
                    });
                match spawned {
                    Ok(handle) => ReaperHandle::Thread(handle),
                    Err(err) => {
                        warn!(error = %err, "Failed to spawn reaper thread");
                        ReaperHandle::Unavailable
                    }
                }
            }
        };

        Self {
            stop_tx: Mutex::new(Some(stop_tx)),
            handle,
        }
    }

    // == Stop ==
    /// Signals the reaper to exit. Calling this more than once is a no-op.
    pub fn stop(&self) {
        match self.stop_tx.lock().take() {
            Some(tx) => {
                // Err means the task already exited on its own
                let _ = tx.send(());
                debug!("Stop signal sent to expiry reaper");
            }
            None => debug!("Expiry reaper already stopped"),
        }
    }

    /// Returns true once the reaper loop has exited.
    pub fn is_finished(&self) -> bool {
        match &self.handle {
            ReaperHandle::Task(handle) => handle.is_finished(),
            ReaperHandle::Thread(handle) => handle.is_finished(),
            ReaperHandle::Unavailable => true,
        }
    }
}

async fn run<T: Reap>(target: Weak<T>, interval: Duration, mut stop_rx: oneshot::Receiver<()>) {
    info!(
        "Starting expiry reaper with interval of {} ms",
        interval.as_millis()
    );

    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                info!("Expiry reaper stopped");
                break;
            }
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else {
                    debug!("Cache dropped, expiry reaper exiting");
                    break;
                };
                let report = target.reap();
                drop(target);

                if report.total() > 0 {
                    info!(
                        "Expiry reaper: removed {} expired and {} orphaned entries",
                        report.expired, report.orphaned
                    );
                } else {
                    debug!("Expiry reaper: no expired entries found");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingTarget {
        sweeps: AtomicUsize,
    }

    impl Reap for CountingTarget {
        fn reap(&self) -> ReapReport {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            ReapReport {
                expired: 1,
                orphaned: 0,
            }
        }
    }

    #[tokio::test]
    async fn test_reaper_sweeps_periodically() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(target.sweeps.load(Ordering::SeqCst) >= 2);
        reaper.stop();
    }

    #[tokio::test]
    async fn test_reaper_waits_one_interval_before_first_sweep() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(target.sweeps.load(Ordering::SeqCst), 0);
        reaper.stop();
    }

    #[tokio::test]
    async fn test_reaper_can_be_stopped() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_millis(20));

        reaper.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(reaper.is_finished(), "Reaper should be finished after stop");
        let sweeps = target.sweeps.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target.sweeps.load(Ordering::SeqCst), sweeps);
    }

    #[tokio::test]
    async fn test_reaper_stop_twice_is_harmless() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_millis(20));

        reaper.stop();
        reaper.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(reaper.is_finished());
    }

    #[tokio::test]
    async fn test_reaper_exits_when_target_dropped() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_millis(20));

        drop(target);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(reaper.is_finished());
    }

    #[test]
    fn test_reaper_runs_without_ambient_runtime() {
        let target = Arc::new(CountingTarget::default());
        let reaper = Reaper::spawn(Arc::downgrade(&target), Duration::from_millis(20));

        thread::sleep(Duration::from_millis(150));
        assert!(target.sweeps.load(Ordering::SeqCst) >= 2);

        reaper.stop();
        thread::sleep(Duration::from_millis(100));
        assert!(reaper.is_finished());
    }
}
