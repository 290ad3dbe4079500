pub mod traits;
pub mod evolution;
pub mod termination;
pub mod execution;
pub mod walk_forward;
pub mod scoring;
pub mod evaluator;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use evolution::{EvolutionConfig, SeedMode};
pub use termination::TerminationConfig;
pub use execution::{BackendKind, ExecutionConfig, RemoteConfig};
pub use walk_forward::WalkForwardConfig;
pub use scoring::{MetricFilter, ObjectiveWeight, ScoringConfig};
pub use evaluator::EvaluatorConfig;
