use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::gene_spec::GeneSpec;
use crate::engines::generation::termination::SearchState;
use crate::error::{OptimizerError, Result};
use crate::types::{EvaluationResult, Gene};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One batch of candidates evaluated together
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    number: usize,
    created_at: DateTime<Utc>,
    candidates: Vec<Candidate>,
    fruitless: bool,
}

impl Generation {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn is_fruitless(&self) -> bool {
        self.fruitless
    }

    /// Candidates that passed the success filter. Empty for fruitless generations,
    /// whose raw candidates stay in `candidates()`.
    pub fn viable(&self) -> &[Candidate] {
        if self.fruitless {
            &[]
        } else {
            &self.candidates
        }
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.is_scored())
            .max_by(|a, b| {
                a.score()
                    .partial_cmp(&b.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    pub fn pending(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| !c.is_scored())
    }
}

/// Ordered generation history and the single deduplication authority
pub struct GenerationStore {
    specs: Vec<GeneSpec>,
    max_generation_size: usize,
    generations: Vec<Generation>,
    seen: HashSet<Vec<Gene>>,
    best: Option<Candidate>,
    generations_since_improvement: usize,
    consecutive_fruitless: usize,
}

impl GenerationStore {
    pub fn new(specs: Vec<GeneSpec>, max_generation_size: usize) -> Self {
        Self {
            specs,
            max_generation_size: max_generation_size.max(1),
            generations: Vec::new(),
            seen: HashSet::new(),
            best: None,
            generations_since_improvement: 0,
            consecutive_fruitless: 0,
        }
    }

    /// Create generation 1
    pub fn seed(&mut self, initial: Vec<Candidate>) -> Result<&Generation> {
        if !self.generations.is_empty() {
            return Err(OptimizerError::Validation(
                "generation store already seeded".to_string(),
            ));
        }
        self.push_generation(initial)
    }

    /// Deduplicate `candidates` and store them as the next generation
    pub fn advance(&mut self, candidates: Vec<Candidate>) -> Result<&Generation> {
        if self.generations.is_empty() {
            return Err(OptimizerError::Validation(
                "generation store must be seeded before advancing".to_string(),
            ));
        }
        self.push_generation(candidates)
    }

    fn push_generation(&mut self, candidates: Vec<Candidate>) -> Result<&Generation> {
        for candidate in &candidates {
            self.validate(candidate)?;
        }

        let mut unique: Vec<Candidate> = Vec::with_capacity(candidates.len());
        let mut positions: HashMap<Vec<Gene>, usize> = HashMap::new();

        for candidate in candidates {
            match positions.get(candidate.genes()) {
                Some(&pos) => {
                    // Scored copy always wins, whatever the arrival order
                    if !unique[pos].is_scored() && candidate.is_scored() {
                        unique[pos] = candidate;
                    }
                }
                None => {
                    positions.insert(candidate.genes().to_vec(), unique.len());
                    unique.push(candidate);
                }
            }
        }

        let before = unique.len();
        unique.retain(|c| c.is_scored() || !self.seen.contains(c.genes()));
        let known = before - unique.len();

        for candidate in &unique {
            self.seen.insert(candidate.genes().to_vec());
        }

        let number = self.generations.len() + 1;
        log::debug!(
            "Generation {} stored with {} candidates ({} already evaluated elsewhere dropped)",
            number,
            unique.len(),
            known
        );

        self.generations.push(Generation {
            number,
            created_at: Utc::now(),
            candidates: unique,
            fruitless: false,
        });

        Ok(&self.generations[number - 1])
    }

    fn validate(&self, candidate: &Candidate) -> Result<()> {
        if candidate.genes().len() != self.specs.len() {
            return Err(OptimizerError::Validation(format!(
                "candidate has {} genes, expected {}",
                candidate.genes().len(),
                self.specs.len()
            )));
        }
        for (gene, spec) in candidate.genes().iter().zip(&self.specs) {
            if gene.key != spec.key {
                return Err(OptimizerError::Validation(format!(
                    "gene '{}' found where '{}' was expected",
                    gene.key, spec.key
                )));
            }
            if !spec.contains(&gene.value)? {
                return Err(OptimizerError::Validation(format!(
                    "{} value {} is outside the domain of gene '{}'",
                    gene.value.type_name(),
                    gene.value,
                    spec.key
                )));
            }
        }
        Ok(())
    }

    /// Record a backend result on the matching candidate of the current generation
    pub fn apply_evaluation(&mut self, id: Uuid, score: f64, result: EvaluationResult) -> bool {
        let Some(generation) = self.generations.last_mut() else {
            return false;
        };
        match generation.candidates.iter_mut().find(|c| c.id() == id) {
            Some(candidate) if !candidate.is_scored() => {
                candidate.set_evaluation(score, result);
                true
            }
            _ => false,
        }
    }

    /// Filter, sort and truncate the current generation once its evaluations are in
    pub fn on_generation_scored(&mut self) -> Result<&Generation> {
        let max_size = self.max_generation_size;
        let generation = self
            .generations
            .last_mut()
            .ok_or_else(|| OptimizerError::Validation("no generation to score".to_string()))?;

        let mut viable: Vec<Candidate> = generation
            .candidates
            .iter()
            .filter(|c| c.is_viable())
            .cloned()
            .collect();

        if viable.is_empty() {
            generation.fruitless = true;
            self.consecutive_fruitless += 1;
        } else {
            viable.sort_by(|a, b| {
                b.score()
                    .partial_cmp(&a.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            viable.truncate(max_size);
            generation.candidates = viable;
            generation.fruitless = false;
            self.consecutive_fruitless = 0;
        }

        let improved = match (generation.viable().first(), &self.best) {
            (Some(top), Some(best)) => top.score() > best.score(),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if improved {
            self.best = generation.viable().first().cloned();
            self.generations_since_improvement = 0;
        } else {
            self.generations_since_improvement += 1;
        }

        let number = generation.number;
        Ok(&self.generations[number - 1])
    }

    pub fn current(&self) -> Option<&Generation> {
        self.generations.last()
    }

    pub fn history(&self) -> &[Generation] {
        &self.generations
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn has_seen(&self, genes: &[Gene]) -> bool {
        self.seen.contains(genes)
    }

    pub fn state(&self) -> SearchState {
        SearchState {
            generation: self.generations.len(),
            best_score: self.best.as_ref().and_then(Candidate::score),
            generations_since_improvement: self.generations_since_improvement,
            consecutive_fruitless: self.consecutive_fruitless,
        }
    }
}
