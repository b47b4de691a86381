//! Owned lifecycle for periodic background tasks.
//!
//! The composition root creates one [`TaskSupervisor`], hands it every
//! [`PeriodicJob`] (cache sweep, metrics persistence, cleanup), and calls
//! [`TaskSupervisor::shutdown`] once the server has stopped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shortest interval a job may run on. Zero intervals are raised to this.
pub const MIN_JOB_INTERVAL: Duration = Duration::from_secs(1);

/// A unit of work executed on a fixed interval.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Time between two runs.
    fn interval(&self) -> Duration;

    /// Performs one run. Failures are logged by the job itself.
    async fn run_once(&self);
}

/// Owns the shutdown signal and join handles of all spawned jobs.
#[derive(Debug)]
pub struct TaskSupervisor {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// A receiver that flips to `true` when shutdown starts.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Number of jobs started so far.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Starts `job` on its interval. The first run happens one interval after spawning.
    pub fn spawn(&mut self, job: Arc<dyn PeriodicJob>) {
        let name = job.name().to_string();
        let mut period = job.interval();
        if period < MIN_JOB_INTERVAL {
            warn!(
                job = %name,
                interval_ms = period.as_millis() as u64,
                "Job interval below minimum, using 1s"
            );
            period = MIN_JOB_INTERVAL;
        }
        let mut cancel = self.subscribe();

        info!(job = %name, interval_secs = period.as_secs(), "Starting background job");

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            debug!(job = %task_name, "Background job received shutdown signal");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        job.run_once().await;
                    }
                }
            }
        });

        self.handles.push((name, handle));
    }

    /// Signals every job to stop and waits up to `grace` for each to finish.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in self.handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => debug!(job = %name, "Background job stopped"),
                Ok(Err(e)) => warn!(job = %name, error = %e, "Background job panicked"),
                Err(_) => warn!(job = %name, "Background job did not stop within grace period"),
            }
        }

        info!("All background jobs stopped");
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        every: Duration,
        runs: AtomicUsize,
    }

    impl Counter {
        fn every(every: Duration) -> Arc<Self> {
            Arc::new(Self {
                every,
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PeriodicJob for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn interval(&self) -> Duration {
            self.every
        }

        async fn run_once(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_on_interval_and_stops() {
        let job = Counter::every(Duration::from_secs(10));
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn(job.clone());
        assert_eq!(supervisor.len(), 1);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        supervisor.shutdown(Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let job = Counter::every(Duration::ZERO);
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn(job.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        supervisor.shutdown(Duration::from_secs(1)).await;
    }
}
