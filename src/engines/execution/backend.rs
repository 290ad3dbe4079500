//! Contract shared by every execution backend.
//!
//! A backend receives evaluation work through [`ExecutionBackend::submit`],
//! runs it in [`ExecutionBackend::run_pending`] and hands results back through
//! [`ExecutionBackend::take_completed`]. Results are kept in a [`TaskSet`]: a
//! single mutex-guarded collection that worker threads fill concurrently and
//! the engine thread drains.

use crate::engines::evaluation::Evaluation;
use crate::engines::generation::candidate::Candidate;
use crate::error::Result;
use crate::types::{DateWindow, EvaluationResult, Gene};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// Work for one candidate over one window
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub task_id: u64,
    pub candidate_id: Uuid,
    pub genes: Vec<Gene>,
    pub window: DateWindow,
}

#[derive(Debug, Clone)]
pub struct CompletedEvaluation {
    pub candidate_id: Uuid,
    pub score: f64,
    pub result: EvaluationResult,
}

#[derive(Debug)]
struct TaskEntry {
    task: PendingTask,
    outcome: Option<Evaluation>,
}

#[derive(Debug, Default)]
struct TaskSetInner {
    entries: Vec<TaskEntry>,
    next_id: u64,
    epoch: u64,
}

/// Shared task collection. Completions carry the epoch they were started
/// under; anything reported after [`TaskSet::invalidate`] or
/// [`TaskSet::clear`] is discarded.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    inner: Arc<Mutex<TaskSetInner>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TaskSetInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, candidate_id: Uuid, genes: Vec<Gene>, window: DateWindow) -> u64 {
        let mut inner = self.lock();
        let task_id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(TaskEntry {
            task: PendingTask {
                task_id,
                candidate_id,
                genes,
                window,
            },
            outcome: None,
        });
        task_id
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Snapshot of tasks still lacking an outcome
    pub fn pending(&self) -> Vec<PendingTask> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.outcome.is_none())
            .map(|e| e.task.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.outcome.is_none())
            .count()
    }

    /// Record an outcome. Returns false when the result arrived too late.
    pub fn complete(&self, epoch: u64, task_id: u64, evaluation: Evaluation) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            log::debug!("Discarding late result for task {}", task_id);
            return false;
        }
        match inner.entries.iter_mut().find(|e| e.task.task_id == task_id) {
            Some(entry) if entry.outcome.is_none() => {
                entry.outcome = Some(evaluation);
                true
            }
            _ => false,
        }
    }

    /// Remove finished tasks and return their results
    pub fn take_completed(&self) -> Vec<CompletedEvaluation> {
        let mut inner = self.lock();
        let entries = std::mem::take(&mut inner.entries);
        let (done, pending): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.outcome.is_some());
        inner.entries = pending;

        done.into_iter()
            .filter_map(|entry| {
                let evaluation = entry.outcome?;
                Some(CompletedEvaluation {
                    candidate_id: entry.task.candidate_id,
                    score: evaluation.score,
                    result: EvaluationResult {
                        metrics: evaluation.metrics,
                        window: entry.task.window,
                    },
                })
            })
            .collect()
    }

    /// Stop accepting results from work already handed out
    pub fn invalidate(&self) {
        self.lock().epoch += 1;
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.epoch += 1;
    }
}

/// Cooperative cancellation flag shared with worker threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub trait ExecutionBackend: Send {
    fn name(&self) -> &'static str;

    fn tasks(&self) -> &TaskSet;

    fn cancel_token(&self) -> &CancelToken;

    /// Block until every pending task has an outcome or `timeout` elapses.
    /// Returns false on timeout or cancellation.
    fn run_pending(&mut self, timeout: Duration) -> Result<bool>;

    /// Queue `candidate` for evaluation over `window`. Scored candidates are skipped.
    fn submit(&mut self, candidate: &Candidate, window: &DateWindow) -> bool {
        if candidate.is_scored() {
            return false;
        }
        log::debug!("{}: queued {} ({})", self.name(), candidate.id(), candidate.describe());
        self.tasks()
            .push(candidate.id(), candidate.genes().to_vec(), *window);
        true
    }

    fn take_completed(&mut self) -> Vec<CompletedEvaluation> {
        self.tasks().take_completed()
    }

    fn pending_count(&self) -> usize {
        self.tasks().pending_count()
    }

    /// Best-effort: in-flight work is abandoned, not killed
    fn cancel(&self) {
        self.cancel_token().cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token().is_cancelled()
    }

    /// Drop every task handle and rearm cancellation
    fn clear(&mut self) {
        self.tasks().clear();
        self.cancel_token().reset();
    }
}
