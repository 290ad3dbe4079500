use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid gene spec: {0}")]
    InvalidSpec(String),

    #[error("Evaluation timed out in generation {generation} after {elapsed_secs:.1}s")]
    EvaluationTimeout { generation: usize, elapsed_secs: f64 },

    #[error("Search already reached its termination condition")]
    AlreadyTerminated,

    #[error("Search has not been started")]
    NotStarted,

    #[error("Evaluation cancelled in generation {generation}")]
    Cancelled { generation: usize },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Remote execution error: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
