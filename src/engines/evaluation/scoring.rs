use crate::config::scoring::{MetricFilter, ObjectiveWeight, ScoringConfig};
use crate::engines::evaluation::evaluator::Evaluation;
use crate::types::FILTERED_SCORE;
use std::collections::HashMap;

/// Turns a raw statistics map into a single score.
///
/// The weighted score is computed first and the filters are applied after it,
/// so a filtered result always carries [`FILTERED_SCORE`].
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    objectives: Vec<ObjectiveWeight>,
    filters: Vec<MetricFilter>,
}

impl ScoreCalculator {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            objectives: config.objectives.clone(),
            filters: config.filters.clone(),
        }
    }

    pub fn score(&self, metrics: &HashMap<String, f64>) -> f64 {
        let mut fitness = 0.0;

        for objective in &self.objectives {
            if let Some(&value) = metrics.get(&objective.metric) {
                fitness += objective.weight * value;
            }
        }

        if self.passes_filters(metrics) && fitness.is_finite() {
            fitness
        } else {
            FILTERED_SCORE
        }
    }

    pub fn passes_filters(&self, metrics: &HashMap<String, f64>) -> bool {
        self.filters.iter().all(|filter| match metrics.get(&filter.metric) {
            Some(&value) => {
                filter.min.map_or(true, |min| value >= min)
                    && filter.max.map_or(true, |max| value <= max)
            }
            None => false,
        })
    }

    pub fn evaluate(&self, metrics: HashMap<String, f64>) -> Evaluation {
        let score = self.score(&metrics);
        Evaluation::new(metrics, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weighted_sum() {
        let calculator = ScoreCalculator::new(&ScoringConfig {
            objectives: vec![
                ObjectiveWeight { metric: "sharpe_ratio".to_string(), weight: 0.5 },
                ObjectiveWeight { metric: "return_pct".to_string(), weight: 0.1 },
            ],
            filters: Vec::new(),
        });
        let score = calculator.score(&metrics(&[("sharpe_ratio", 2.0), ("return_pct", 10.0)]));
        assert!((score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_filters_replace_score_with_sentinel() {
        let calculator = ScoreCalculator::new(&ScoringConfig {
            objectives: vec![ObjectiveWeight { metric: "sharpe_ratio".to_string(), weight: 1.0 }],
            filters: vec![MetricFilter {
                metric: "num_trades".to_string(),
                min: Some(10.0),
                max: None,
            }],
        });

        let passing = calculator.evaluate(metrics(&[("sharpe_ratio", 1.2), ("num_trades", 25.0)]));
        assert_eq!(passing.score, 1.2);

        let too_few = calculator.evaluate(metrics(&[("sharpe_ratio", 1.2), ("num_trades", 3.0)]));
        assert_eq!(too_few.score, FILTERED_SCORE);
        assert_eq!(too_few.metrics.len(), 2);

        let missing = calculator.score(&metrics(&[("sharpe_ratio", 1.2)]));
        assert_eq!(missing, FILTERED_SCORE);
    }
}
