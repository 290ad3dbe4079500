use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::optimisation::splitters::types::SearchWindow;
use crate::engines::generation::progress::ProgressCallback;
use crate::error::Result;
use crate::types::{non_finite, EvaluationResult, Gene};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// In-sample versus out-of-sample outcome of one top candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowValidation {
    pub window: SearchWindow,
    pub candidate_id: Uuid,
    pub genes: Vec<Gene>,
    pub in_sample_score: f64,
    pub in_sample: Option<EvaluationResult>,
    pub out_of_sample_score: f64,
    pub out_of_sample: EvaluationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: SearchWindow,
    pub generations: usize,
    pub best: Option<Candidate>,
    pub validations: Vec<WindowValidation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub method: String,
    pub windows: Vec<WindowReport>,
    #[serde(with = "non_finite::map")]
    pub aggregate_metrics: HashMap<String, f64>,
}

impl WalkForwardReport {
    pub fn validations(&self) -> impl Iterator<Item = &WindowValidation> {
        self.windows.iter().flat_map(|w| w.validations.iter())
    }
}

pub trait ValidationMethod {
    fn name(&self) -> &str;

    /// Search and validate every window, reporting progress to `callback`
    fn run(&self, callback: &mut dyn ProgressCallback) -> Result<WalkForwardReport>;
}
