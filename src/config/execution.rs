use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Hard bounds applied to the local worker count
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub backend: BackendKind,
    pub min_workers: usize,
    pub max_workers: usize,
    pub evaluation_timeout_secs: u64,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sequential,
    LocalParallel,
    RemoteBatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub nodes: usize,
    pub poll_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            nodes: 4,
            poll_interval_ms: 250,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::LocalParallel,
            min_workers: MIN_WORKERS,
            max_workers: available_parallelism(),
            evaluation_timeout_secs: 3600,
            remote: RemoteConfig::default(),
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
        .clamp(MIN_WORKERS, MAX_WORKERS)
}

impl ExecutionConfig {
    /// Machine parallelism squeezed into the configured and hard worker bounds
    pub fn worker_count(&self) -> usize {
        let low = self.min_workers.clamp(MIN_WORKERS, MAX_WORKERS);
        let high = self.max_workers.clamp(low, MAX_WORKERS);
        available_parallelism().clamp(low, high)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.remote.poll_interval_ms)
    }
}

impl FromStr for BackendKind {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(BackendKind::Sequential),
            "local_parallel" | "parallel" => Ok(BackendKind::LocalParallel),
            "remote_batch" | "remote" => Ok(BackendKind::RemoteBatch),
            other => Err(OptimizerError::Configuration(format!(
                "unknown execution backend '{}'",
                other
            ))),
        }
    }
}

impl ConfigSection for ExecutionConfig {
    fn section_name() -> &'static str {
        "execution"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        if self.min_workers > self.max_workers {
            return Err(invalid::<Self>("min_workers cannot exceed max_workers"));
        }
        if self.evaluation_timeout_secs == 0 {
            return Err(invalid::<Self>("evaluation_timeout_secs must be positive"));
        }
        if self.remote.nodes == 0 {
            return Err(invalid::<Self>("remote.nodes must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_respects_bounds() {
        let config = ExecutionConfig {
            min_workers: 3,
            max_workers: 3,
            ..ExecutionConfig::default()
        };
        assert_eq!(config.worker_count(), 3);

        let config = ExecutionConfig {
            min_workers: 0,
            max_workers: 1_000,
            ..ExecutionConfig::default()
        };
        let workers = config.worker_count();
        assert!((MIN_WORKERS..=MAX_WORKERS).contains(&workers));
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("sequential".parse::<BackendKind>().unwrap(), BackendKind::Sequential);
        assert_eq!("local-parallel".parse::<BackendKind>().unwrap(), BackendKind::LocalParallel);
        assert_eq!("remote".parse::<BackendKind>().unwrap(), BackendKind::RemoteBatch);
        assert!("gpu".parse::<BackendKind>().is_err());
    }
}
