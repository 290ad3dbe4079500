use crate::types::{EvaluationResult, Gene, GeneValue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One parameter vector under evaluation.
///
/// The gene vector is fixed at construction. Score and evaluation result are
/// filled in once, after a backend has run the candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    id: Uuid,
    genes: Vec<Gene>,
    score: Option<f64>,
    result: Option<EvaluationResult>,
}

impl Candidate {
    pub fn new(genes: Vec<Gene>) -> Self {
        Self {
            id: Uuid::new_v4(),
            genes,
            score: None,
            result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn gene(&self, key: &str) -> Option<&GeneValue> {
        self.genes.iter().find(|g| g.key == key).map(|g| &g.value)
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        self.result.as_ref()
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// Positive score means the candidate survived the success filter
    pub fn is_viable(&self) -> bool {
        self.score.map(|s| s > 0.0).unwrap_or(false)
    }

    pub fn set_evaluation(&mut self, score: f64, result: EvaluationResult) {
        self.score = Some(score);
        self.result = Some(result);
    }

    /// Element-wise equality of keys and values
    pub fn same_genes(&self, other: &Candidate) -> bool {
        self.genes == other.genes
    }

    /// Copy with the same identity and genes but no evaluation, used for
    /// out-of-sample runs.
    pub fn clone_for_validation(&self) -> Candidate {
        Candidate {
            id: self.id,
            genes: self.genes.clone(),
            score: None,
            result: None,
        }
    }

    /// New unscored candidate with one gene replaced
    pub fn with_gene(&self, index: usize, value: GeneValue) -> Candidate {
        let mut genes = self.genes.clone();
        if let Some(gene) = genes.get_mut(index) {
            gene.value = value;
        }
        Candidate::new(genes)
    }

    pub fn describe(&self) -> String {
        self.genes
            .iter()
            .map(|g| format!("{}={}", g.key, g.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateWindow;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn sample() -> Candidate {
        Candidate::new(vec![
            Gene::new("fast", GeneValue::Int(10)),
            Gene::new("slow", GeneValue::Int(50)),
        ])
    }

    #[test]
    fn test_clone_for_validation_keeps_identity() {
        let mut candidate = sample();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        candidate.set_evaluation(
            1.5,
            EvaluationResult {
                metrics: HashMap::new(),
                window: DateWindow::new(day, day),
            },
        );

        let clone = candidate.clone_for_validation();
        assert_eq!(clone.id(), candidate.id());
        assert!(clone.same_genes(&candidate));
        assert!(clone.score().is_none());
        assert!(clone.result().is_none());
    }

    #[test]
    fn test_with_gene_creates_new_identity() {
        let candidate = sample();
        let changed = candidate.with_gene(1, GeneValue::Int(60));
        assert_ne!(changed.id(), candidate.id());
        assert_eq!(changed.gene("slow"), Some(&GeneValue::Int(60)));
        assert!(!changed.same_genes(&candidate));
    }
}
