use super::remote::{RemoteBatchService, RemoteTaskState, WorkUnit};
use crate::engines::evaluation::FitnessEvaluator;
use crate::error::{OptimizerError, Result};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct UnitRecord {
    state: RemoteTaskState,
    output: Option<String>,
    cancelled: bool,
}

/// Remote batch service simulated by a pool of `nodes` local threads and a
/// result store keyed by correlation id.
pub struct InProcessFleet {
    evaluator: Arc<dyn FitnessEvaluator>,
    pool: rayon::ThreadPool,
    nodes: usize,
    store: Arc<Mutex<HashMap<String, UnitRecord>>>,
}

impl InProcessFleet {
    pub fn new(evaluator: Arc<dyn FitnessEvaluator>, nodes: usize) -> Result<Self> {
        let nodes = nodes.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nodes)
            .thread_name(|i| format!("fleet-node-{}", i))
            .build()
            .map_err(|e| OptimizerError::Configuration(format!("fleet pool: {}", e)))?;

        Ok(Self {
            evaluator,
            pool,
            nodes,
            store: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn store(&self) -> MutexGuard<'_, HashMap<String, UnitRecord>> {
        lock(&self.store)
    }
}

fn lock(store: &Mutex<HashMap<String, UnitRecord>>) -> MutexGuard<'_, HashMap<String, UnitRecord>> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

fn run_unit(
    evaluator: &dyn FitnessEvaluator,
    unit: &WorkUnit,
) -> (RemoteTaskState, Option<String>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        evaluator.evaluate(&unit.genes, &unit.window)
    }));
    match outcome {
        Ok(Ok(evaluation)) => match serde_json::to_string(&evaluation) {
            Ok(output) => (RemoteTaskState::Completed, Some(output)),
            Err(e) => (RemoteTaskState::Failed(e.to_string()), None),
        },
        Ok(Err(e)) => (RemoteTaskState::Failed(e.to_string()), None),
        Err(_) => (RemoteTaskState::Failed("evaluator panicked".to_string()), None),
    }
}

impl RemoteBatchService for InProcessFleet {
    fn capacity(&self) -> usize {
        self.nodes
    }

    fn submit(&self, payload: &str) -> Result<()> {
        let unit: WorkUnit = serde_json::from_str(payload)
            .map_err(|e| OptimizerError::Remote(format!("malformed work unit: {}", e)))?;

        self.store().insert(
            unit.correlation_id.clone(),
            UnitRecord {
                state: RemoteTaskState::Queued,
                output: None,
                cancelled: false,
            },
        );

        let evaluator = Arc::clone(&self.evaluator);
        let store = Arc::clone(&self.store);
        self.pool.spawn(move || {
            {
                let mut records = lock(&store);
                let Some(record) = records.get_mut(&unit.correlation_id) else { return };
                if record.cancelled {
                    records.remove(&unit.correlation_id);
                    return;
                }
                record.state = RemoteTaskState::Running;
            }

            let (state, output) = run_unit(evaluator.as_ref(), &unit);

            let mut records = lock(&store);
            let Some(record) = records.get_mut(&unit.correlation_id) else { return };
            if record.cancelled {
                records.remove(&unit.correlation_id);
            } else {
                record.state = state;
                record.output = output;
            }
        });
        Ok(())
    }

    /// A `Failed` state is reported once; the record is dropped with it
    fn status(&self, correlation_id: &str) -> Result<RemoteTaskState> {
        let mut store = self.store();
        let state = store
            .get(correlation_id)
            .map(|r| r.state.clone())
            .ok_or_else(|| OptimizerError::Remote(format!("unknown unit {}", correlation_id)))?;
        if matches!(state, RemoteTaskState::Failed(_)) {
            store.remove(correlation_id);
        }
        Ok(state)
    }

    fn fetch_result(&self, correlation_id: &str) -> Result<String> {
        let mut store = self.store();
        match store.get(correlation_id) {
            Some(record) if record.state == RemoteTaskState::Completed => store
                .remove(correlation_id)
                .and_then(|r| r.output)
                .ok_or_else(|| {
                    OptimizerError::Remote(format!("unit {} has no output", correlation_id))
                }),
            Some(record) => Err(OptimizerError::Remote(format!(
                "unit {} is {:?}",
                correlation_id, record.state
            ))),
            None => Err(OptimizerError::Remote(format!("unknown unit {}", correlation_id))),
        }
    }

    /// Finished units are dropped at once; a running unit is dropped by its
    /// node when the evaluation returns
    fn cancel(&self, correlation_id: &str) {
        let mut store = self.store();
        let Some(record) = store.get_mut(correlation_id) else { return };
        if record.state.is_terminal() {
            store.remove(correlation_id);
        } else {
            record.cancelled = true;
            record.state = RemoteTaskState::Failed("cancelled".to_string());
        }
    }
}
