use super::backend::{CancelToken, ExecutionBackend, TaskSet};
use crate::engines::evaluation::{evaluate_isolated, FitnessEvaluator};
use crate::error::{OptimizerError, Result};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the waiting thread looks at the cancel flag
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Evaluates pending tasks on a fixed-size rayon pool owned by the backend.
///
/// Workers write outcomes straight into the shared [`TaskSet`]; the calling
/// thread only waits for completion signals. On timeout the task set's epoch is
/// bumped so work still running in the pool cannot record a result later, and
/// queued work is skipped without running.
pub struct LocalParallelBackend {
    evaluator: Arc<dyn FitnessEvaluator>,
    tasks: TaskSet,
    cancel: CancelToken,
    pool: rayon::ThreadPool,
    workers: usize,
}

impl LocalParallelBackend {
    pub fn new(evaluator: Arc<dyn FitnessEvaluator>, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("evaluator-{}", i))
            .build()
            .map_err(|e| OptimizerError::Configuration(format!("worker pool: {}", e)))?;

        Ok(Self {
            evaluator,
            tasks: TaskSet::new(),
            cancel: CancelToken::default(),
            pool,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl ExecutionBackend for LocalParallelBackend {
    fn name(&self) -> &'static str {
        "local_parallel"
    }

    fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn run_pending(&mut self, timeout: Duration) -> Result<bool> {
        let pending = self.tasks.pending();
        if pending.is_empty() {
            return Ok(true);
        }

        let epoch = self.tasks.epoch();
        let deadline = Instant::now() + timeout;
        let (tx, rx) = mpsc::channel::<u64>();

        log::debug!("Dispatching {} tasks to {} workers", pending.len(), self.workers);

        let mut remaining = pending.len();
        for task in pending {
            let tx = tx.clone();
            let evaluator = Arc::clone(&self.evaluator);
            let tasks = self.tasks.clone();
            let cancel = self.cancel.clone();
            self.pool.spawn(move || {
                // Abandoned before it started
                if cancel.is_cancelled() || tasks.epoch() != epoch {
                    return;
                }
                let evaluation = evaluate_isolated(evaluator.as_ref(), &task.genes, &task.window);
                tasks.complete(epoch, task.task_id, evaluation);
                let _ = tx.send(task.task_id);
            });
        }
        drop(tx);

        while remaining > 0 {
            if self.cancel.is_cancelled() {
                self.tasks.invalidate();
                log::info!("Parallel run cancelled with {} tasks in flight", remaining);
                return Ok(false);
            }

            let now = Instant::now();
            if now >= deadline {
                self.tasks.invalidate();
                log::warn!(
                    "Parallel run exceeded {:.1}s with {} tasks in flight",
                    timeout.as_secs_f64(),
                    remaining
                );
                return Ok(false);
            }

            match rx.recv_timeout((deadline - now).min(CANCEL_POLL)) {
                Ok(_) => remaining -= 1,
                Err(RecvTimeoutError::Timeout) => continue,
                // Every worker is done; skipped ones never signal
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(self.tasks.pending_count() == 0)
    }
}
