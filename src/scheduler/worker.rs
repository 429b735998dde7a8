use crate::models::{Outcome, Task, Timings};
use crate::report::ResultReporter;
use crate::scheduler::queue::TaskSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Executes one task end to end. Implementations own their session for the
/// duration of the call; the pool guarantees one call at a time per worker.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &Task) -> Outcome;
}

/// Fixed set of sequential workers over a shared task source. A worker
/// finishes its current task on shutdown; queued tasks are left behind.
pub struct WorkerPool {
    workers: usize,
    pacing: Duration,
}

impl WorkerPool {
    pub fn new(workers: usize, pacing: Duration) -> Self {
        Self { workers, pacing }
    }

    pub async fn run(
        &self,
        source: Arc<dyn TaskSource>,
        runner: Arc<dyn TaskRunner>,
        reporter: Arc<ResultReporter>,
        shutdown: watch::Receiver<bool>,
    ) {
        let mut set = JoinSet::new();

        for worker_id in 0..self.workers {
            let source = Arc::clone(&source);
            let runner = Arc::clone(&runner);
            let reporter = Arc::clone(&reporter);
            let mut shutdown = shutdown.clone();
            let pacing = self.pacing;

            set.spawn(async move {
                tracing::info!("👷 Worker {} started", worker_id);
                loop {
                    if *shutdown.borrow() {
                        break;
                    }

                    let task = tokio::select! {
                        _ = shutdown.changed() => break,
                        task = source.next_task() => task,
                    };

                    let Some(task) = task else {
                        tracing::info!("👷 Worker {} | task source exhausted", worker_id);
                        break;
                    };

                    tracing::info!("👷 Worker {} | task {} picked up", worker_id, task.id);
                    let outcome = run_isolated(&runner, &task).await;
                    reporter.report(&task, &outcome).await;

                    sleep(pacing).await;
                }
                tracing::info!("👷 Worker {} stopped", worker_id);
            });
        }

        drop(shutdown);
        while set.join_next().await.is_some() {}
    }
}

/// Runs the task in its own tokio task so a panic poisons neither the
/// worker loop nor its siblings.
async fn run_isolated(runner: &Arc<dyn TaskRunner>, task: &Task) -> Outcome {
    let start = chrono::Utc::now();
    let runner = Arc::clone(runner);
    let task_clone = task.clone();

    match tokio::spawn(async move { runner.run(&task_clone).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("TID: {} | 💥 Task execution panicked: {}", task.id, e);
            Outcome::Failure {
                reason: crate::error::FailureReason::Internal,
                message: "worker task panicked".to_string(),
                timings: Timings::since(start),
            }
        }
    }
}
