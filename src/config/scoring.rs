use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub objectives: Vec<ObjectiveWeight>,
    pub filters: Vec<MetricFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeight {
    pub metric: String,
    pub weight: f64,
}

/// Bounds a metric must satisfy for a result to count as successful
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFilter {
    pub metric: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            objectives: vec![ObjectiveWeight {
                metric: "sharpe_ratio".to_string(),
                weight: 1.0,
            }],
            filters: Vec::new(),
        }
    }
}

impl ConfigSection for ScoringConfig {
    fn section_name() -> &'static str {
        "scoring"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        for objective in &self.objectives {
            if !objective.weight.is_finite() {
                return Err(invalid::<Self>(&format!(
                    "weight of '{}' must be finite",
                    objective.metric
                )));
            }
        }
        for filter in &self.filters {
            if let (Some(min), Some(max)) = (filter.min, filter.max) {
                if min > max {
                    return Err(invalid::<Self>(&format!(
                        "filter on '{}' has min above max",
                        filter.metric
                    )));
                }
            }
        }
        Ok(())
    }
}
