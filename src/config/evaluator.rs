use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External backtest process launched once per evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ConfigSection for EvaluatorConfig {
    fn section_name() -> &'static str {
        "evaluator"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        if self.command.trim().is_empty() {
            return Err(invalid::<Self>("command must be set"));
        }
        Ok(())
    }
}
