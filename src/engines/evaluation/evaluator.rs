use crate::error::Result;
use crate::types::{non_finite, DateWindow, Gene, FILTERED_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Raw statistics of one simulation run and the score derived from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(with = "non_finite::map")]
    pub metrics: HashMap<String, f64>,
    #[serde(with = "non_finite")]
    pub score: f64,
}

impl Evaluation {
    pub fn new(metrics: HashMap<String, f64>, score: f64) -> Self {
        Self { metrics, score }
    }

    /// Result recorded for a failed or rejected evaluation
    pub fn filtered() -> Self {
        Self {
            metrics: HashMap::new(),
            score: FILTERED_SCORE,
        }
    }
}

/// Runs the external simulation for one parameter vector over one window.
/// Higher scores are better.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, genes: &[Gene], window: &DateWindow) -> Result<Evaluation>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&[Gene], &DateWindow) -> Result<Evaluation> + Send + Sync,
{
    fn evaluate(&self, genes: &[Gene], window: &DateWindow) -> Result<Evaluation> {
        self(genes, window)
    }
}

/// Evaluate without letting a failure escape: errors, panics and NaN scores
/// all become [`Evaluation::filtered`].
pub fn evaluate_isolated(
    evaluator: &dyn FitnessEvaluator,
    genes: &[Gene],
    window: &DateWindow,
) -> Evaluation {
    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(genes, window))) {
        Ok(Ok(evaluation)) if evaluation.score.is_nan() => {
            log::warn!("Evaluator returned NaN score over {}, treating as filtered", window);
            Evaluation::filtered()
        }
        Ok(Ok(evaluation)) => evaluation,
        Ok(Err(e)) => {
            log::warn!("Evaluation over {} failed: {}", window, e);
            Evaluation::filtered()
        }
        Err(_) => {
            log::warn!("Evaluator panicked over {}", window);
            Evaluation::filtered()
        }
    }
}
