//! Background retry of course reconciliations that failed inline.

use crate::aggregator::CourseCompletionAggregator;
use crate::config::ReconcileConfig;
use primm_types::{CourseId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::{JoinError, JoinSet};

/// One pending reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileJob {
    pub user_id: UserId,
    pub course_id: CourseId,
}

/// Cloneable handle used to hand jobs to the worker.
#[derive(Debug, Clone)]
pub struct ReconcileQueue {
    tx: mpsc::Sender<ReconcileJob>,
}

impl ReconcileQueue {
    /// Queue a job. Returns `false` when the queue is full or the worker is
    /// gone; the job is then logged at error level.
    pub fn enqueue(&self, user_id: UserId, course_id: CourseId) -> bool {
        let job = ReconcileJob { user_id, course_id };
        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(
                    user_id = %user_id,
                    course_id = %course_id,
                    "Reconciliation queued for retry"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    course_id = %course_id,
                    error = %e,
                    "Could not queue reconciliation retry"
                );
                false
            }
        }
    }
}

/// Retries queued reconciliations with exponential backoff.
pub struct ReconcileWorker {
    aggregator: Arc<CourseCompletionAggregator>,
    config: ReconcileConfig,
    queue: ReconcileQueue,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
}

impl ReconcileWorker {
    /// Create a worker and the receiving end of its queue.
    pub fn new(
        aggregator: Arc<CourseCompletionAggregator>,
        config: ReconcileConfig,
    ) -> (Arc<Self>, mpsc::Receiver<ReconcileJob>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        let worker = Arc::new(Self {
            aggregator,
            config,
            queue: ReconcileQueue { tx },
            running: Arc::new(RwLock::new(false)),
            shutdown,
        });
        (worker, rx)
    }

    pub fn queue(&self) -> ReconcileQueue {
        self.queue.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Process jobs until [`stop`](Self::stop) is called.
    ///
    /// On stop, jobs still sitting in the queue and jobs waiting out a
    /// backoff get one final attempt. Shutdown then waits up to
    /// `shutdown_grace_ms` for those attempts before aborting them.
    pub async fn start(self: Arc<Self>, mut rx: mpsc::Receiver<ReconcileJob>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }
        tracing::info!("Reconcile worker started");

        let mut stop = self.shutdown.subscribe();
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => self.spawn_job(&mut in_flight, job),
                    None => break,
                },
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_task_result(result);
                }
                _ = stopped(&mut stop) => break,
            }
        }

        rx.close();
        while let Ok(job) = rx.try_recv() {
            self.spawn_job(&mut in_flight, job);
        }

        if !in_flight.is_empty() {
            tracing::info!(pending = in_flight.len(), "Waiting for in-flight reconciliations");
        }
        let drain = async {
            while let Some(result) = in_flight.join_next().await {
                log_task_result(result);
            }
        };
        if tokio::time::timeout(self.config.shutdown_grace(), drain).await.is_err() {
            tracing::error!(
                abandoned = in_flight.len(),
                grace_ms = self.config.shutdown_grace_ms,
                "Reconciliations still running after shutdown grace, aborting"
            );
            in_flight.shutdown().await;
        }

        let mut running = self.running.write().await;
        *running = false;
        tracing::info!("Reconcile worker stopped");
    }

    /// Signal the worker to stop. A stopped worker does not restart.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    fn spawn_job(self: &Arc<Self>, in_flight: &mut JoinSet<()>, job: ReconcileJob) {
        let worker = self.clone();
        in_flight.spawn(async move {
            worker.process(job).await;
        });
    }

    /// Retry one job until it succeeds or `max_attempts` is exhausted.
    /// Returns whether the reconciliation eventually ran.
    ///
    /// Once the worker is stopping, the backoff is cut short and a failed
    /// attempt is final.
    pub async fn process(&self, job: ReconcileJob) -> bool {
        let mut stop = self.shutdown.subscribe();
        for attempt in 1..=self.config.max_attempts {
            if !*stop.borrow() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.backoff(attempt)) => {}
                    _ = stopped(&mut stop) => {}
                }
            }
            match self.aggregator.reconcile(job.user_id, job.course_id).await {
                Ok(is_complete) => {
                    tracing::info!(
                        user_id = %job.user_id,
                        course_id = %job.course_id,
                        attempt,
                        is_complete,
                        "Reconciliation retry succeeded"
                    );
                    return true;
                }
                Err(e) if *stop.borrow() => {
                    tracing::error!(
                        user_id = %job.user_id,
                        course_id = %job.course_id,
                        attempt,
                        error = %e,
                        "Reconciliation abandoned at shutdown"
                    );
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %job.user_id,
                        course_id = %job.course_id,
                        attempt,
                        error = %e,
                        "Reconciliation retry failed"
                    );
                }
            }
        }

        tracing::error!(
            user_id = %job.user_id,
            course_id = %job.course_id,
            attempts = self.config.max_attempts,
            "Giving up on course reconciliation"
        );
        false
    }
}

/// Resolves once the stop flag is set.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    // A closed channel means the worker is gone, which also counts as stopped.
    let _ = rx.wait_for(|stop| *stop).await;
}

fn log_task_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Reconciliation task failed");
    }
}
