use crate::config::evolution::{EvolutionConfig, SeedMode};
use crate::engines::execution::{CancelToken, ExecutionBackend};
use crate::engines::generation::{
    candidate::Candidate,
    factory::CandidateFactory,
    generation_store::{Generation, GenerationStore},
    hall_of_fame::HallOfFame,
    operators::{crossover, mutate, neighborhood, roulette_selection, CrossoverOperator},
    progress::ProgressCallback,
    termination::Termination,
};
use crate::error::{OptimizerError, Result};
use crate::types::DateWindow;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default budget for one generation's evaluations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    NotStarted,
    Started,
    Stopped,
    TerminationReached,
    /// A fatal error aborted the search
    Failed,
}

/// Lets another thread halt a running engine
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl StopHandle {
    /// Halt before the next generation begins
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Halt and abandon the evaluations currently in flight
    pub fn cancel(&self) {
        self.stop();
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}

pub struct EvolutionEngine {
    config: EvolutionConfig,
    factory: CandidateFactory,
    store: GenerationStore,
    backend: Box<dyn ExecutionBackend>,
    termination: Box<dyn Termination>,
    hall_of_fame: HallOfFame,
    window: DateWindow,
    timeout: Duration,
    state: EngineState,
    stop: StopHandle,
    started_at: Option<Instant>,
    rng: StdRng,
}

impl EvolutionEngine {
    pub fn new(
        config: EvolutionConfig,
        factory: CandidateFactory,
        backend: Box<dyn ExecutionBackend>,
        termination: Box<dyn Termination>,
        window: DateWindow,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let stop = StopHandle {
            stop: Arc::new(AtomicBool::new(false)),
            cancel: backend.cancel_token().clone(),
        };

        Self {
            store: GenerationStore::new(factory.specs().to_vec(), config.max_generation_size),
            hall_of_fame: HallOfFame::new(config.hall_of_fame_size),
            config,
            factory,
            backend,
            termination,
            window,
            timeout: DEFAULT_TIMEOUT,
            state: EngineState::NotStarted,
            stop,
            started_at: None,
            rng,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Seed generation 1, evaluate it and run until termination or stop
    pub fn start(&mut self, callback: &mut dyn ProgressCallback) -> Result<EngineState> {
        if self.state != EngineState::NotStarted {
            return Err(OptimizerError::Validation(
                "evolution engine already started".to_string(),
            ));
        }

        self.state = EngineState::Started;
        self.started_at = Some(Instant::now());
        log::info!(
            "Starting search over {} with termination: {}",
            self.window,
            self.termination.name()
        );

        let initial = match self.config.seed_mode {
            SeedMode::Random => self
                .factory
                .random_batch(self.config.population_size, &mut self.rng),
            SeedMode::Cartesian => self.factory.cartesian()?.collect(),
        };
        self.store.seed(initial)?;

        self.evaluate_current(callback)?;
        self.run_loop(callback)
    }

    /// Continue a stopped search
    pub fn resume(&mut self, callback: &mut dyn ProgressCallback) -> Result<EngineState> {
        match self.state {
            EngineState::NotStarted => return Err(OptimizerError::NotStarted),
            EngineState::TerminationReached => return Err(OptimizerError::AlreadyTerminated),
            EngineState::Failed => {
                return Err(OptimizerError::Validation(
                    "search was aborted by a fatal error".to_string(),
                ))
            }
            EngineState::Started => {
                return Err(OptimizerError::Validation("search is already running".to_string()))
            }
            EngineState::Stopped => {}
        }

        if self.termination.has_reached(&self.store.state()) {
            self.state = EngineState::TerminationReached;
            return Err(OptimizerError::AlreadyTerminated);
        }

        self.stop.reset();
        self.state = EngineState::Started;
        log::info!("Resuming search at generation {}", self.store.history().len() + 1);
        self.run_loop(callback)
    }

    fn run_loop(&mut self, callback: &mut dyn ProgressCallback) -> Result<EngineState> {
        while self.state == EngineState::Started {
            if self.stop.is_stop_requested() {
                self.state = EngineState::Stopped;
                log::info!("Search stopped after generation {}", self.store.history().len());
                break;
            }

            let next = self.breed()?;
            self.store.advance(next)?;
            self.evaluate_current(callback)?;
        }
        Ok(self.state)
    }

    /// Candidates for the next generation
    fn breed(&mut self) -> Result<Vec<Candidate>> {
        let current = self.store.current().ok_or(OptimizerError::NotStarted)?;

        if current.is_fruitless() {
            log::info!(
                "Generation {} was fruitless, reseeding with {} random candidates",
                current.number(),
                self.config.population_size
            );
            // Survivors already carried in from an earlier reseed are left behind
            let history = self.store.history();
            let carried_in: HashSet<Uuid> = match history.len().checked_sub(2) {
                Some(i) if history[i].is_fruitless() => {
                    history[i].candidates().iter().map(Candidate::id).collect()
                }
                _ => HashSet::new(),
            };

            let mut next = self
                .factory
                .random_batch(self.config.population_size, &mut self.rng);
            next.extend(
                current
                    .candidates()
                    .iter()
                    .filter(|c| !carried_in.contains(&c.id()))
                    .cloned(),
            );
            return Ok(next);
        }

        let pool = current.viable();
        let mut next = Vec::with_capacity(self.config.population_size * 2);

        while next.len() < self.config.population_size {
            let parents: Vec<&Candidate> = (0..self.config.crossover_parents)
                .map(|_| roulette_selection(pool, &mut self.rng))
                .collect();
            let operator = CrossoverOperator::random(&mut self.rng);
            let child = crossover(
                operator,
                &parents,
                self.config.crossover_mix_probability,
                &mut self.rng,
            );
            next.push(mutate(
                child,
                self.config.mutation_probability,
                &self.factory,
                &mut self.rng,
            ));
        }

        // Elites carry their scores, so they are never re-evaluated
        let elite_count = self.config.elite_count(pool.len());
        next.extend(pool.iter().take(elite_count).cloned());

        if let Some(best) = self.store.best().or_else(|| pool.first()) {
            next.extend(neighborhood(
                best,
                self.config.neighborhood_rounds,
                &self.factory,
                &mut self.rng,
            ));
        }

        Ok(next)
    }

    /// Run the current generation through the backend, then score and notify
    fn evaluate_current(&mut self, callback: &mut dyn ProgressCallback) -> Result<()> {
        let (number, pending) = {
            let generation = self.store.current().ok_or(OptimizerError::NotStarted)?;
            let pending: Vec<Candidate> = generation.pending().cloned().collect();
            (generation.number(), pending)
        };

        self.backend.clear();
        for candidate in &pending {
            self.backend.submit(candidate, &self.window);
        }
        log::debug!(
            "Generation {}: {} candidates submitted to {} backend",
            number,
            pending.len(),
            self.backend.name()
        );

        let batch_started = Instant::now();
        let finished = match self.backend.run_pending(self.timeout) {
            Ok(finished) => finished,
            Err(e) => return Err(self.fail(number, e)),
        };

        if !finished {
            let error = if self.backend.is_cancelled() {
                OptimizerError::Cancelled { generation: number }
            } else {
                OptimizerError::EvaluationTimeout {
                    generation: number,
                    elapsed_secs: batch_started.elapsed().as_secs_f64(),
                }
            };
            self.backend.clear();
            return Err(self.fail(number, error));
        }

        for done in self.backend.take_completed() {
            if !self.store.apply_evaluation(done.candidate_id, done.score, done.result) {
                log::warn!("Result for unknown candidate {} discarded", done.candidate_id);
            }
        }

        self.store.on_generation_scored()?;
        let generation = self.store.current().ok_or(OptimizerError::NotStarted)?;
        for candidate in generation.viable() {
            self.hall_of_fame.try_add(candidate.clone());
        }

        log::info!(
            "Generation {}: {} viable, best {}, hall of fame {}",
            number,
            generation.viable().len(),
            self.store
                .best()
                .and_then(Candidate::score)
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "none".to_string()),
            self.hall_of_fame.len()
        );

        callback.on_generation_complete(generation);

        if self.termination.has_reached(&self.store.state()) {
            self.state = EngineState::TerminationReached;
            log::info!(
                "Termination reached after {} generations ({})",
                number,
                self.termination.name()
            );
            callback.on_termination(self.store.history());
        }

        Ok(())
    }

    fn fail(&mut self, generation: usize, error: OptimizerError) -> OptimizerError {
        self.state = EngineState::Failed;
        log::error!(
            "Search aborted in generation {} after {:.1}s: {}",
            generation,
            self.elapsed().as_secs_f64(),
            error
        );
        error
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Time since `start`
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    pub fn history(&self) -> &[Generation] {
        self.store.history()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.store.best()
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    pub fn get_hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::Evaluation;
    use crate::engines::execution::SequentialBackend;
    use crate::engines::generation::gene_spec::GeneSpec;
    use crate::engines::generation::optimisation::methods::base::WindowValidation;
    use crate::engines::generation::termination::{AnyOf, FruitlessLimit, GenerationLimit};
    use crate::types::{Gene, FILTERED_SCORE};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Recorder {
        generations: Vec<(usize, bool)>,
        terminations: usize,
    }

    impl ProgressCallback for Recorder {
        fn on_generation_complete(&mut self, generation: &Generation) {
            self.generations
                .push((generation.number(), generation.is_fruitless()));
        }

        fn on_termination(&mut self, _history: &[Generation]) {
            self.terminations += 1;
        }

        fn on_window_validated(&mut self, _validation: &WindowValidation) {}
    }

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    fn config() -> EvolutionConfig {
        EvolutionConfig {
            population_size: 8,
            seed: Some(42),
            ..EvolutionConfig::default()
        }
    }

    fn factory() -> CandidateFactory {
        CandidateFactory::new(vec![GeneSpec::int("fast", 1, 50), GeneSpec::int("slow", 1, 50)])
            .unwrap()
    }

    fn engine<F>(evaluator: F, termination: Box<dyn Termination>) -> EvolutionEngine
    where
        F: Fn(&[Gene], &DateWindow) -> Result<Evaluation> + Send + Sync + 'static,
    {
        EvolutionEngine::new(
            config(),
            factory(),
            Box::new(SequentialBackend::new(Arc::new(evaluator))),
            termination,
            window(),
        )
    }

    fn sum_score(genes: &[Gene], _: &DateWindow) -> Result<Evaluation> {
        let score: f64 = genes.iter().map(|g| g.value.as_f64()).sum();
        Ok(Evaluation::new(HashMap::from([("sum".to_string(), score)]), score))
    }

    #[test]
    fn test_runs_until_generation_limit() {
        let mut engine = engine(sum_score, Box::new(GenerationLimit::new(4)));
        let mut recorder = Recorder::default();

        let state = engine.start(&mut recorder).unwrap();
        assert_eq!(state, EngineState::TerminationReached);
        assert_eq!(engine.history().len(), 4);
        assert_eq!(recorder.terminations, 1);

        let numbers: Vec<usize> = recorder.generations.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(engine.best().unwrap().score().unwrap() > 0.0);
        assert!(!engine.get_hall_of_fame().is_empty());
    }

    #[test]
    fn test_resume_after_termination_fails() {
        let mut engine = engine(sum_score, Box::new(GenerationLimit::new(2)));
        let mut recorder = Recorder::default();

        assert!(matches!(
            engine.resume(&mut recorder),
            Err(OptimizerError::NotStarted)
        ));
        engine.start(&mut recorder).unwrap();
        assert!(matches!(
            engine.resume(&mut recorder),
            Err(OptimizerError::AlreadyTerminated)
        ));
        assert!(engine.start(&mut recorder).is_err());
    }

    #[test]
    fn test_fruitless_generations_reseed_and_terminate() {
        let never_viable = |_: &[Gene], _: &DateWindow| -> Result<Evaluation> {
            Ok(Evaluation::new(HashMap::new(), FILTERED_SCORE))
        };
        let termination = AnyOf::new(vec![
            Box::new(FruitlessLimit::new(3)),
            Box::new(GenerationLimit::new(10)),
        ]);
        let mut engine = engine(never_viable, Box::new(termination));
        let mut recorder = Recorder::default();

        engine.start(&mut recorder).unwrap();
        assert_eq!(engine.history().len(), 3);
        assert!(recorder.generations.iter().all(|(_, fruitless)| *fruitless));

        // Reseeded generations keep the previous raw candidates and add fresh ones
        let history = engine.history();
        let first = history[0].candidates().len();
        assert!(history[1].candidates().len() > first);
        assert!(engine.best().is_none());

        // Only the latest survivors are carried, so reseeds stay bounded
        for generation in history {
            assert!(generation.candidates().len() <= 2 * config().population_size);
        }
        assert!(history[2]
            .candidates()
            .iter()
            .all(|c| history[0].candidates().iter().all(|old| old.id() != c.id())));
    }

    #[test]
    fn test_stop_then_resume() {
        let mut engine = engine(sum_score, Box::new(GenerationLimit::new(3)));
        let mut recorder = Recorder::default();

        engine.stop_handle().stop();
        assert_eq!(engine.start(&mut recorder).unwrap(), EngineState::Stopped);
        assert_eq!(engine.history().len(), 1);

        assert_eq!(
            engine.resume(&mut recorder).unwrap(),
            EngineState::TerminationReached
        );
        assert_eq!(engine.history().len(), 3);
    }

    #[test]
    fn test_timeout_is_fatal() {
        let slow = |genes: &[Gene], window: &DateWindow| -> Result<Evaluation> {
            std::thread::sleep(Duration::from_millis(30));
            sum_score(genes, window)
        };
        let mut engine = engine(slow, Box::new(GenerationLimit::new(3)))
            .with_timeout(Duration::from_millis(1));
        let mut recorder = Recorder::default();

        let err = engine.start(&mut recorder).unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::EvaluationTimeout { generation: 1, .. }
        ));
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(engine.history()[0].candidates().iter().all(|c| !c.is_scored()));
        assert!(recorder.generations.is_empty());
    }
}
