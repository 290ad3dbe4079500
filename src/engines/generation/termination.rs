//! Composable stop conditions evaluated after every scored generation.

use crate::config::termination::TerminationConfig;

/// Snapshot of search progress the predicates look at
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchState {
    pub generation: usize,
    pub best_score: Option<f64>,
    pub generations_since_improvement: usize,
    pub consecutive_fruitless: usize,
}

pub trait Termination: Send + Sync {
    fn name(&self) -> String;

    fn has_reached(&self, state: &SearchState) -> bool;
}

/// Reached once `max` generations exist
pub struct GenerationLimit {
    max: usize,
}

impl GenerationLimit {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Termination for GenerationLimit {
    fn name(&self) -> String {
        format!("generation limit {}", self.max)
    }

    fn has_reached(&self, state: &SearchState) -> bool {
        state.generation >= self.max
    }
}

/// Reached when the best score has not improved for `generations` generations
pub struct FitnessStagnation {
    generations: usize,
}

impl FitnessStagnation {
    pub fn new(generations: usize) -> Self {
        Self { generations }
    }
}

impl Termination for FitnessStagnation {
    fn name(&self) -> String {
        format!("fitness stagnation over {} generations", self.generations)
    }

    fn has_reached(&self, state: &SearchState) -> bool {
        state.best_score.is_some() && state.generations_since_improvement >= self.generations
    }
}

/// Reached after `max` fruitless generations in a row
pub struct FruitlessLimit {
    max: usize,
}

impl FruitlessLimit {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Termination for FruitlessLimit {
    fn name(&self) -> String {
        format!("{} consecutive fruitless generations", self.max)
    }

    fn has_reached(&self, state: &SearchState) -> bool {
        state.consecutive_fruitless >= self.max
    }
}

/// Logical OR. With no children it is never reached.
#[derive(Default)]
pub struct AnyOf {
    children: Vec<Box<dyn Termination>>,
}

impl AnyOf {
    pub fn new(children: Vec<Box<dyn Termination>>) -> Self {
        Self { children }
    }

    pub fn push(&mut self, child: Box<dyn Termination>) {
        self.children.push(child);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Termination for AnyOf {
    fn name(&self) -> String {
        let names: Vec<String> = self.children.iter().map(|c| c.name()).collect();
        format!("any of [{}]", names.join(", "))
    }

    fn has_reached(&self, state: &SearchState) -> bool {
        self.children.iter().any(|c| c.has_reached(state))
    }
}

/// Logical AND. With no children it is never reached.
#[derive(Default)]
pub struct AllOf {
    children: Vec<Box<dyn Termination>>,
}

impl AllOf {
    pub fn new(children: Vec<Box<dyn Termination>>) -> Self {
        Self { children }
    }
}

impl Termination for AllOf {
    fn name(&self) -> String {
        let names: Vec<String> = self.children.iter().map(|c| c.name()).collect();
        format!("all of [{}]", names.join(", "))
    }

    fn has_reached(&self, state: &SearchState) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.has_reached(state))
    }
}

/// OR of every predicate the configuration enables
pub fn from_config(config: &TerminationConfig) -> AnyOf {
    let mut any = AnyOf::default();
    if let Some(max) = config.max_generations {
        any.push(Box::new(GenerationLimit::new(max)));
    }
    if let Some(generations) = config.stagnation_generations {
        any.push(Box::new(FitnessStagnation::new(generations)));
    }
    if let Some(max) = config.max_fruitless_generations {
        any.push(Box::new(FruitlessLimit::new(max)));
    }
    any
}
