use super::backend::{CancelToken, ExecutionBackend, TaskSet};
use crate::engines::evaluation::{evaluate_isolated, FitnessEvaluator};
use crate::error::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Evaluates pending tasks one by one on the calling thread
pub struct SequentialBackend {
    evaluator: Arc<dyn FitnessEvaluator>,
    tasks: TaskSet,
    cancel: CancelToken,
}

impl SequentialBackend {
    pub fn new(evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        Self {
            evaluator,
            tasks: TaskSet::new(),
            cancel: CancelToken::default(),
        }
    }
}

impl ExecutionBackend for SequentialBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn run_pending(&mut self, timeout: Duration) -> Result<bool> {
        let started = Instant::now();
        let epoch = self.tasks.epoch();

        for task in self.tasks.pending() {
            if self.cancel.is_cancelled() {
                log::info!("Sequential run cancelled");
                return Ok(false);
            }

            let evaluation = evaluate_isolated(self.evaluator.as_ref(), &task.genes, &task.window);

            // A task that overran the budget is not recorded
            if started.elapsed() > timeout {
                log::warn!(
                    "Sequential run exceeded {:.1}s with {} tasks pending",
                    timeout.as_secs_f64(),
                    self.tasks.pending_count()
                );
                return Ok(false);
            }
            self.tasks.complete(epoch, task.task_id, evaluation);
        }

        Ok(self.tasks.pending_count() == 0)
    }
}
