use super::traits::{invalid, ConfigSection};
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub max_generation_size: usize,
    pub mutation_probability: f64,
    pub crossover_parents: usize,
    pub crossover_mix_probability: f64,
    pub elitism_rate: f64,
    pub neighborhood_rounds: usize,
    pub hall_of_fame_size: usize,
    pub seed_mode: SeedMode,
    pub seed: Option<u64>,
}

/// How generation 1 (and every reseed) is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    Random,
    Cartesian,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generation_size: 50,
            mutation_probability: 0.1,
            crossover_parents: 2,
            crossover_mix_probability: 0.5,
            elitism_rate: 0.2,
            neighborhood_rounds: 3,
            hall_of_fame_size: 10,
            seed_mode: SeedMode::Random,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    /// Number of top candidates carried over unchanged, never below one
    pub fn elite_count(&self, generation_size: usize) -> usize {
        let count = (generation_size as f64 * self.elitism_rate).round() as usize;
        count.max(1).min(generation_size.max(1))
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), OptimizerError> {
        if self.population_size == 0 {
            return Err(invalid::<Self>("population_size must be at least 1"));
        }
        if self.max_generation_size == 0 {
            return Err(invalid::<Self>("max_generation_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return Err(invalid::<Self>("mutation_probability must be between 0 and 1"));
        }
        if !(0.0..=1.0).contains(&self.crossover_mix_probability) {
            return Err(invalid::<Self>("crossover_mix_probability must be between 0 and 1"));
        }
        if !(0.0..=1.0).contains(&self.elitism_rate) {
            return Err(invalid::<Self>("elitism_rate must be between 0 and 1"));
        }
        if self.crossover_parents < 2 {
            return Err(invalid::<Self>("crossover_parents must be at least 2"));
        }
        if self.hall_of_fame_size == 0 {
            return Err(invalid::<Self>("hall_of_fame_size must be at least 1"));
        }
        Ok(())
    }
}
