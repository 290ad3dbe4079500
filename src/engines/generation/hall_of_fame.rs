use crate::engines::generation::candidate::Candidate;
use crate::types::Gene;
use std::collections::HashSet;

/// Best unique candidates seen across every generation of one search
pub struct HallOfFame {
    candidates: Vec<Candidate>,
    max_size: usize,
    seen_signatures: HashSet<Vec<Gene>>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            candidates: Vec::new(),
            max_size: max_size.max(1),
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a candidate. Unscored, non-positive and duplicate
    /// gene vectors are rejected.
    pub fn try_add(&mut self, candidate: Candidate) -> bool {
        if !candidate.is_viable() {
            return false;
        }
        if self.seen_signatures.contains(candidate.genes()) {
            return false;
        }

        self.seen_signatures.insert(candidate.genes().to_vec());
        self.candidates.push(candidate);
        self.sort_and_trim();
        true
    }

    fn sort_and_trim(&mut self) {
        self.candidates.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        while self.candidates.len() > self.max_size {
            if let Some(removed) = self.candidates.pop() {
                self.seen_signatures.remove(removed.genes());
            }
        }
    }

    pub fn get_all(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get_top_n(&self, n: usize) -> &[Candidate] {
        &self.candidates[..n.min(self.candidates.len())]
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn filter_by_threshold(&self, min_score: f64) -> Vec<Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.score().map(|s| s >= min_score).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateWindow, EvaluationResult, GeneValue};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn scored(v: i64, score: f64) -> Candidate {
        let mut c = Candidate::new(vec![Gene::new("period", GeneValue::Int(v))]);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        c.set_evaluation(
            score,
            EvaluationResult {
                metrics: HashMap::new(),
                window: DateWindow::new(day, day),
            },
        );
        c
    }

    #[test]
    fn test_keeps_best_unique_candidates() {
        let mut hof = HallOfFame::new(2);
        assert!(hof.try_add(scored(1, 1.0)));
        assert!(hof.try_add(scored(2, 3.0)));
        assert!(!hof.try_add(scored(2, 5.0)));
        assert!(hof.try_add(scored(3, 2.0)));
        assert!(!hof.try_add(scored(4, -1.0)));

        let scores: Vec<f64> = hof.get_all().iter().filter_map(Candidate::score).collect();
        assert_eq!(scores, vec![3.0, 2.0]);
        assert_eq!(hof.get_top_n(5).len(), 2);

        // Evicted vectors may come back
        assert!(hof.try_add(scored(1, 10.0)));
        assert_eq!(hof.best().and_then(Candidate::score), Some(10.0));
        assert_eq!(hof.filter_by_threshold(3.0).len(), 2);
    }
}
