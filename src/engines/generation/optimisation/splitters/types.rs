use crate::config::walk_forward::WalkForwardConfig;
use crate::types::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One walk-forward iteration: the in-sample search period and the
/// out-of-sample period validated right after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub index: usize,
    pub in_sample: DateWindow,
    pub validation: DateWindow,
}

/// Configuration for window splitting
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub in_sample_days: i64,
    pub step_days: i64,
    pub window_type: WindowType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowType {
    Rolling,  // In-sample start advances with each window
    Anchored, // In-sample start stays put, the period grows
}

impl From<&WalkForwardConfig> for SplitConfig {
    fn from(config: &WalkForwardConfig) -> Self {
        Self {
            start: config.start,
            end: config.end,
            in_sample_days: config.in_sample_days,
            step_days: config.step_days,
            window_type: if config.anchored {
                WindowType::Anchored
            } else {
                WindowType::Rolling
            },
        }
    }
}
