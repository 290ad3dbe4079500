use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub in_sample_days: i64,
    pub step_days: i64,
    pub anchored: bool,
    pub top_n: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or(NaiveDate::MIN),
            in_sample_days: 90,
            step_days: 30,
            anchored: false,
            top_n: 3,
        }
    }
}

impl ConfigSection for WalkForwardConfig {
    fn section_name() -> &'static str {
        "walk_forward"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        if self.end < self.start {
            return Err(invalid::<Self>("end must not be before start"));
        }
        if self.in_sample_days <= 0 {
            return Err(invalid::<Self>("in_sample_days must be positive"));
        }
        if self.step_days <= 0 {
            return Err(invalid::<Self>("step_days must be positive"));
        }
        if self.top_n == 0 {
            return Err(invalid::<Self>("top_n must be at least 1"));
        }
        Ok(())
    }
}
