use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub max_generations: Option<usize>,
    pub stagnation_generations: Option<usize>,
    pub max_fruitless_generations: Option<usize>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            max_generations: Some(25),
            stagnation_generations: Some(8),
            max_fruitless_generations: Some(5),
        }
    }
}

impl ConfigSection for TerminationConfig {
    fn section_name() -> &'static str {
        "termination"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        if self.max_generations.is_none()
            && self.stagnation_generations.is_none()
            && self.max_fruitless_generations.is_none()
        {
            return Err(invalid::<Self>("at least one termination condition is required"));
        }
        if self.max_generations == Some(0) {
            return Err(invalid::<Self>("max_generations must be at least 1"));
        }
        Ok(())
    }
}
