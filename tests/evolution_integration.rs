use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use tradebias_optimizer::config::evolution::{EvolutionConfig, SeedMode};
use tradebias_optimizer::engines::evaluation::Evaluation;
use tradebias_optimizer::engines::execution::{LocalParallelBackend, SequentialBackend};
use tradebias_optimizer::engines::generation::{
    AnyOf, CandidateFactory, ChannelProgressCallback, EngineState, EvolutionEngine,
    FruitlessLimit, GeneSpec, Generation, GenerationLimit, ProgressCallback, ProgressMessage,
    WindowValidation,
};
use tradebias_optimizer::types::{DateWindow, Gene, GeneValue, FILTERED_SCORE};
use tradebias_optimizer::Result;

/// Simple progress callback for testing
#[derive(Default)]
struct TestProgressCallback {
    completed: Vec<usize>,
    terminated: bool,
}

impl ProgressCallback for TestProgressCallback {
    fn on_generation_complete(&mut self, generation: &Generation) {
        self.completed.push(generation.number());
    }

    fn on_termination(&mut self, _history: &[Generation]) {
        self.terminated = true;
    }

    fn on_window_validated(&mut self, _validation: &WindowValidation) {}
}

fn window() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
    )
}

/// Create a minimal evolution config for fast testing
fn create_test_evolution_config() -> EvolutionConfig {
    EvolutionConfig {
        population_size: 10,
        max_generation_size: 20,
        seed: Some(1234),
        ..EvolutionConfig::default()
    }
}

fn moving_average_specs() -> Vec<GeneSpec> {
    vec![
        GeneSpec::int("fast_period", 2, 40),
        GeneSpec::int("slow_period", 10, 200),
        GeneSpec::decimal("stop_loss", dec!(0.5), dec!(5.0)),
    ]
}

/// Peaks at fast=10, slow=50, stop=2.0
fn synthetic_backtest(genes: &[Gene], _window: &DateWindow) -> Result<Evaluation> {
    let fast = genes[0].value.as_f64();
    let slow = genes[1].value.as_f64();
    let stop = genes[2].value.as_f64();
    let score = 100.0 - (fast - 10.0).abs() - (slow - 50.0).abs() / 4.0 - (stop - 2.0).abs();
    let metrics = HashMap::from([
        ("net_profit".to_string(), score * 10.0),
        ("trades".to_string(), 20.0),
    ]);
    Ok(Evaluation::new(metrics, score))
}

#[test]
fn test_evolution_improves_and_terminates() {
    let factory = CandidateFactory::new(moving_average_specs()).unwrap();
    let backend = LocalParallelBackend::new(Arc::new(synthetic_backtest), 4).unwrap();
    let mut engine = EvolutionEngine::new(
        create_test_evolution_config(),
        factory,
        Box::new(backend),
        Box::new(GenerationLimit::new(6)),
        window(),
    );
    let mut callback = TestProgressCallback::default();

    let state = engine.start(&mut callback).expect("evolution failed");

    assert_eq!(state, EngineState::TerminationReached);
    assert_eq!(callback.completed, vec![1, 2, 3, 4, 5, 6]);
    assert!(callback.terminated);

    // The running best never decreases and every stored generation is sorted
    let mut best_so_far = f64::MIN;
    for generation in engine.history() {
        let scores: Vec<f64> = generation.candidates().iter().filter_map(|c| c.score()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(scores.len() <= 20);
        if let Some(top) = scores.first() {
            best_so_far = best_so_far.max(*top);
        }
    }
    assert_eq!(engine.best().and_then(|c| c.score()), Some(best_so_far));

    let hof = engine.get_hall_of_fame();
    assert!(!hof.is_empty());
    assert_eq!(hof.best().and_then(|c| c.score()), Some(best_so_far));
}

#[test]
fn test_no_gene_vector_is_evaluated_twice() {
    let evaluated: Arc<Mutex<Vec<Vec<Gene>>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&evaluated);
    let evaluator = move |genes: &[Gene], window: &DateWindow| -> Result<Evaluation> {
        log.lock().unwrap().push(genes.to_vec());
        synthetic_backtest(genes, window)
    };

    let factory = CandidateFactory::new(vec![
        GeneSpec::int("fast_period", 1, 6),
        GeneSpec::int("slow_period", 1, 6),
    ])
    .unwrap();
    let mut engine = EvolutionEngine::new(
        EvolutionConfig {
            population_size: 6,
            seed: Some(99),
            ..EvolutionConfig::default()
        },
        factory,
        Box::new(SequentialBackend::new(Arc::new(
            move |genes: &[Gene], window: &DateWindow| {
                // Third gene expected by the synthetic backtest
                let mut padded = genes.to_vec();
                padded.push(Gene::new("stop_loss", GeneValue::Decimal(dec!(2.0))));
                evaluator(&padded, window)
            },
        ))),
        Box::new(GenerationLimit::new(8)),
        window(),
    );

    engine.start(&mut TestProgressCallback::default()).unwrap();

    let evaluated = evaluated.lock().unwrap();
    let unique: HashSet<&Vec<Gene>> = evaluated.iter().collect();
    assert_eq!(unique.len(), evaluated.len());
    assert!(evaluated.len() <= 36);
}

#[test]
fn test_fruitless_generation_triggers_reseed() {
    // Only one corner of the space is viable
    let evaluator = |genes: &[Gene], _: &DateWindow| -> Result<Evaluation> {
        let fast = genes[0].value.as_f64();
        let score = if fast >= 39.0 { fast } else { FILTERED_SCORE };
        Ok(Evaluation::new(HashMap::new(), score))
    };

    let factory = CandidateFactory::new(vec![
        GeneSpec::int("fast_period", 2, 40),
        GeneSpec::int("slow_period", 10, 200),
    ])
    .unwrap();
    let termination = AnyOf::new(vec![
        Box::new(FruitlessLimit::new(3)),
        Box::new(GenerationLimit::new(4)),
    ]);
    let mut engine = EvolutionEngine::new(
        EvolutionConfig {
            population_size: 3,
            seed: Some(5),
            ..EvolutionConfig::default()
        },
        factory,
        Box::new(SequentialBackend::new(Arc::new(evaluator))),
        Box::new(termination),
        window(),
    );

    let (tx, rx) = channel();
    let mut callback = ChannelProgressCallback::new(tx);
    engine.start(&mut callback).unwrap();
    drop(callback);

    let messages: Vec<ProgressMessage> = rx.iter().collect();
    assert!(matches!(messages.last(), Some(ProgressMessage::Terminated { .. })));

    let history = engine.history();
    for (i, generation) in history.iter().enumerate().skip(1) {
        let previous = &history[i - 1];
        if !previous.is_fruitless() || !generation.is_fruitless() {
            continue;
        }
        // A reseed is a fresh batch plus the survivors the fruitless generation added
        assert!(generation.candidates().len() <= 6);
        let carried_in: Vec<_> = if i >= 2 && history[i - 2].is_fruitless() {
            history[i - 2].candidates().iter().map(|c| c.id()).collect()
        } else {
            Vec::new()
        };
        for candidate in previous.candidates() {
            if !carried_in.contains(&candidate.id()) {
                assert!(generation.candidates().iter().any(|c| c.same_genes(candidate)));
            }
        }
    }

    for message in &messages {
        if let ProgressMessage::GenerationComplete {
            candidates,
            fruitless,
            ..
        } = message
        {
            assert_eq!(*fruitless, candidates.is_empty());
            assert!(candidates.iter().all(|c| c.score().unwrap() > 0.0));
        }
    }
}

#[test]
fn test_cartesian_seed_enumerates_stepped_domain() {
    let factory = CandidateFactory::new(vec![
        GeneSpec::int("fast_period", 5, 15).with_step(dec!(5)),
        GeneSpec::decimal("stop_loss", dec!(1.0), dec!(2.0)).with_step(dec!(0.5)),
    ])
    .unwrap();
    let evaluator = |genes: &[Gene], _: &DateWindow| -> Result<Evaluation> {
        let score = genes[0].value.as_f64() + genes[1].value.as_f64();
        Ok(Evaluation::new(HashMap::new(), score))
    };
    let mut engine = EvolutionEngine::new(
        EvolutionConfig {
            seed_mode: SeedMode::Cartesian,
            seed: Some(3),
            ..EvolutionConfig::default()
        },
        factory,
        Box::new(SequentialBackend::new(Arc::new(evaluator))),
        Box::new(GenerationLimit::new(1)),
        window(),
    );

    engine.start(&mut TestProgressCallback::default()).unwrap();

    let first = &engine.history()[0];
    assert_eq!(first.candidates().len(), 9);
    assert_eq!(first.candidates()[0].score(), Some(17.0));
    assert_eq!(
        first.candidates()[0].gene("fast_period"),
        Some(&GeneValue::Int(15))
    );
}
