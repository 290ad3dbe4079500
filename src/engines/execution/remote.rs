//! Batch execution on a remote fleet.
//!
//! Each pending task is serialized into a [`WorkUnit`], handed to a
//! [`RemoteBatchService`] and tracked by correlation id until the service
//! reports it finished. A failed unit only costs that candidate its score.

use super::backend::{CancelToken, ExecutionBackend, PendingTask, TaskSet};
use crate::engines::evaluation::Evaluation;
use crate::error::Result;
use crate::types::{DateWindow, Gene};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Serialized payload sent to the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub correlation_id: String,
    pub genes: Vec<Gene>,
    pub window: DateWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteTaskState {
    Queued,
    Running,
    Completed,
    Failed(String),
}

impl RemoteTaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteTaskState::Completed | RemoteTaskState::Failed(_))
    }
}

/// Job submission and result retrieval on the remote side
pub trait RemoteBatchService: Send + Sync {
    /// Units the fleet accepts at once
    fn capacity(&self) -> usize;

    /// Submit a serialized [`WorkUnit`]
    fn submit(&self, payload: &str) -> Result<()>;

    fn status(&self, correlation_id: &str) -> Result<RemoteTaskState>;

    /// Serialized [`Evaluation`] of a completed unit
    fn fetch_result(&self, correlation_id: &str) -> Result<String>;

    fn cancel(&self, correlation_id: &str);
}

pub struct RemoteBatchBackend {
    service: Arc<dyn RemoteBatchService>,
    poll_interval: Duration,
    tasks: TaskSet,
    cancel: CancelToken,
}

impl RemoteBatchBackend {
    pub fn new(service: Arc<dyn RemoteBatchService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            tasks: TaskSet::new(),
            cancel: CancelToken::default(),
        }
    }

    fn dispatch(&self, task: &PendingTask) -> Result<String> {
        let unit = WorkUnit {
            correlation_id: Uuid::new_v4().to_string(),
            genes: task.genes.clone(),
            window: task.window,
        };
        let payload = serde_json::to_string(&unit)?;
        self.service.submit(&payload)?;
        Ok(unit.correlation_id)
    }

    fn collect(&self, correlation_id: &str) -> Evaluation {
        let fetched = self
            .service
            .fetch_result(correlation_id)
            .and_then(|payload| Ok(serde_json::from_str::<Evaluation>(&payload)?));
        match fetched {
            Ok(evaluation) if !evaluation.score.is_nan() => evaluation,
            Ok(_) => {
                log::warn!("Unit {} returned NaN score, treating as filtered", correlation_id);
                Evaluation::filtered()
            }
            Err(e) => {
                log::warn!("Could not retrieve result of unit {}: {}", correlation_id, e);
                Evaluation::filtered()
            }
        }
    }

    fn abandon(&self, in_flight: &HashMap<String, u64>) {
        for correlation_id in in_flight.keys() {
            self.service.cancel(correlation_id);
        }
        self.tasks.invalidate();
    }
}

impl ExecutionBackend for RemoteBatchBackend {
    fn name(&self) -> &'static str {
        "remote_batch"
    }

    fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn run_pending(&mut self, timeout: Duration) -> Result<bool> {
        let epoch = self.tasks.epoch();
        let deadline = Instant::now() + timeout;
        let capacity = self.service.capacity().max(1);

        let mut queue: VecDeque<PendingTask> = self.tasks.pending().into();
        let mut in_flight: HashMap<String, u64> = HashMap::new();

        log::debug!("Submitting {} units, capacity {}", queue.len(), capacity);

        loop {
            if self.cancel.is_cancelled() {
                self.abandon(&in_flight);
                log::info!("Remote run cancelled with {} units in flight", in_flight.len());
                return Ok(false);
            }

            while in_flight.len() < capacity {
                let Some(task) = queue.pop_front() else { break };
                match self.dispatch(&task) {
                    Ok(correlation_id) => {
                        in_flight.insert(correlation_id, task.task_id);
                    }
                    Err(e) => {
                        log::warn!("Submission of {} failed: {}", task.candidate_id, e);
                        self.tasks.complete(epoch, task.task_id, Evaluation::filtered());
                    }
                }
            }

            if in_flight.is_empty() && queue.is_empty() {
                break;
            }

            let mut finished = Vec::new();
            for (correlation_id, &task_id) in &in_flight {
                let evaluation = match self.service.status(correlation_id) {
                    Ok(RemoteTaskState::Completed) => self.collect(correlation_id),
                    Ok(RemoteTaskState::Failed(reason)) => {
                        log::warn!("Unit {} failed remotely: {}", correlation_id, reason);
                        Evaluation::filtered()
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("Status of unit {} unavailable: {}", correlation_id, e);
                        Evaluation::filtered()
                    }
                };
                self.tasks.complete(epoch, task_id, evaluation);
                finished.push(correlation_id.clone());
            }
            for correlation_id in finished {
                in_flight.remove(&correlation_id);
            }

            if in_flight.is_empty() && queue.is_empty() {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "Remote run exceeded {:.1}s with {} units in flight and {} queued",
                    timeout.as_secs_f64(),
                    in_flight.len(),
                    queue.len()
                );
                self.abandon(&in_flight);
                return Ok(false);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }

        Ok(self.tasks.pending_count() == 0)
    }
}
