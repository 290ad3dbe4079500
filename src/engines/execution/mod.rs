//! Execution backends: where and how candidate evaluations actually run.

pub mod backend;
pub mod fleet;
pub mod parallel;
pub mod remote;
pub mod sequential;

pub use backend::{CancelToken, CompletedEvaluation, ExecutionBackend, PendingTask, TaskSet};
pub use fleet::InProcessFleet;
pub use parallel::LocalParallelBackend;
pub use remote::{RemoteBatchBackend, RemoteBatchService, RemoteTaskState, WorkUnit};
pub use sequential::SequentialBackend;

use crate::config::execution::{BackendKind, ExecutionConfig};
use crate::engines::evaluation::FitnessEvaluator;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builds fresh backends of one configured family
#[derive(Clone)]
pub struct BackendFactory {
    config: ExecutionConfig,
    evaluator: Arc<dyn FitnessEvaluator>,
    remote: Option<Arc<dyn RemoteBatchService>>,
}

impl BackendFactory {
    pub fn new(config: ExecutionConfig, evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        Self {
            config,
            evaluator,
            remote: None,
        }
    }

    /// Use `service` instead of an in-process fleet for the remote family
    pub fn with_remote_service(mut self, service: Arc<dyn RemoteBatchService>) -> Self {
        self.remote = Some(service);
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.config.backend
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn create(&self) -> Result<Box<dyn ExecutionBackend>> {
        let backend: Box<dyn ExecutionBackend> = match self.config.backend {
            BackendKind::Sequential => {
                Box::new(SequentialBackend::new(Arc::clone(&self.evaluator)))
            }
            BackendKind::LocalParallel => Box::new(LocalParallelBackend::new(
                Arc::clone(&self.evaluator),
                self.config.worker_count(),
            )?),
            BackendKind::RemoteBatch => {
                let service: Arc<dyn RemoteBatchService> = match &self.remote {
                    Some(service) => Arc::clone(service),
                    None => Arc::new(InProcessFleet::new(
                        Arc::clone(&self.evaluator),
                        self.config.remote.nodes,
                    )?),
                };
                Box::new(RemoteBatchBackend::new(service, self.config.poll_interval()))
            }
        };
        log::debug!("Created {} backend", backend.name());
        Ok(backend)
    }
}
