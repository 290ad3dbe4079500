use super::base::*;
use crate::config::evolution::EvolutionConfig;
use crate::config::execution::BackendKind;
use crate::config::manager::AppConfig;
use crate::config::termination::TerminationConfig;
use crate::config::traits::ConfigSection;
use crate::engines::execution::{BackendFactory, CompletedEvaluation};
use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::evolution_engine::EvolutionEngine;
use crate::engines::generation::factory::CandidateFactory;
use crate::engines::generation::optimisation::splitters::{
    base::WindowSplitter,
    types::SearchWindow,
    wfo::WalkForwardSplitter,
};
use crate::engines::generation::progress::ProgressCallback;
use crate::engines::generation::termination;
use crate::error::{OptimizerError, Result};
use crate::types::{DateWindow, FILTERED_SCORE};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Runs an independent evolutionary search per window, then validates the
/// window's top candidates out of sample.
pub struct WalkForwardDriver {
    splitter: WalkForwardSplitter,
    evolution: EvolutionConfig,
    termination: TerminationConfig,
    factory: CandidateFactory,
    backends: BackendFactory,
    top_n: usize,
}

impl WalkForwardDriver {
    pub fn new(config: &AppConfig, backends: BackendFactory) -> Result<Self> {
        config.evolution.validate()?;
        config.termination.validate()?;
        config.walk_forward.validate()?;

        Ok(Self {
            splitter: WalkForwardSplitter::from_config(&config.walk_forward),
            evolution: config.evolution.clone(),
            termination: config.termination.clone(),
            factory: CandidateFactory::new(config.genes.clone())?,
            backends,
            top_n: config.walk_forward.top_n,
        })
    }

    pub fn windows(&self) -> Result<Vec<SearchWindow>> {
        self.splitter.split()
    }

    fn search_window(
        &self,
        window: &SearchWindow,
        callback: &mut dyn ProgressCallback,
    ) -> Result<WindowReport> {
        log::info!(
            "Window {}: in-sample {}, validation {}",
            window.index,
            window.in_sample,
            window.validation
        );

        let mut engine = EvolutionEngine::new(
            self.evolution.clone(),
            self.factory.clone(),
            self.backends.create()?,
            Box::new(termination::from_config(&self.termination)),
            window.in_sample,
        )
        .with_timeout(self.backends.timeout());

        if let Err(e) = engine.start(callback) {
            log::error!(
                "Walk-forward halted in window {} at generation {} after {:.1}s: {}",
                window.index,
                engine.history().len(),
                engine.elapsed().as_secs_f64(),
                e
            );
            return Err(e);
        }

        let top = engine.get_hall_of_fame().get_top_n(self.top_n).to_vec();
        let validations = self.validate(window, &top, engine.history().len(), callback)?;

        Ok(WindowReport {
            window: *window,
            generations: engine.history().len(),
            best: engine.best().cloned(),
            validations,
        })
    }

    /// Evaluate `top` once over the validation period. No success filter.
    fn validate(
        &self,
        window: &SearchWindow,
        top: &[Candidate],
        generation: usize,
        callback: &mut dyn ProgressCallback,
    ) -> Result<Vec<WindowValidation>> {
        if top.is_empty() {
            log::warn!("Window {} produced no viable candidates to validate", window.index);
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let Some(completed) = self.run_validations(top, &window.validation)? else {
            let elapsed_secs = started.elapsed().as_secs_f64();
            log::error!(
                "Validation of window {} timed out after {:.1}s",
                window.index,
                elapsed_secs
            );
            return Err(OptimizerError::EvaluationTimeout {
                generation,
                elapsed_secs,
            });
        };

        let completed: HashMap<_, _> = completed
            .into_iter()
            .map(|done| (done.candidate_id, done))
            .collect();

        let mut validations = Vec::with_capacity(top.len());
        for candidate in top {
            let Some(done) = completed.get(&candidate.id()) else {
                continue;
            };
            let validation = WindowValidation {
                window: *window,
                candidate_id: candidate.id(),
                genes: candidate.genes().to_vec(),
                in_sample_score: candidate.score().unwrap_or(FILTERED_SCORE),
                in_sample: candidate.result().cloned(),
                out_of_sample_score: done.score,
                out_of_sample: done.result.clone(),
            };
            callback.on_window_validated(&validation);
            validations.push(validation);
        }
        Ok(validations)
    }

    /// Fresh copies of `top` evaluated over `period`; `None` on timeout.
    fn run_validations(
        &self,
        top: &[Candidate],
        period: &DateWindow,
    ) -> Result<Option<Vec<CompletedEvaluation>>> {
        let timeout = self.backends.timeout();

        if self.backends.kind() != BackendKind::Sequential {
            let mut backend = self.backends.create()?;
            for candidate in top {
                backend.submit(&candidate.clone_for_validation(), period);
            }
            if !backend.run_pending(timeout)? {
                return Ok(None);
            }
            return Ok(Some(backend.take_completed()));
        }

        // One sequential backend per candidate so validations do not queue
        let mut backends = Vec::with_capacity(top.len());
        for candidate in top {
            let mut backend = self.backends.create()?;
            backend.submit(&candidate.clone_for_validation(), period);
            backends.push(backend);
        }

        let finished: Vec<Result<bool>> = backends
            .par_iter_mut()
            .map(|backend| backend.run_pending(timeout))
            .collect();
        for outcome in finished {
            if !outcome? {
                return Ok(None);
            }
        }

        Ok(Some(
            backends
                .iter_mut()
                .flat_map(|backend| backend.take_completed())
                .collect(),
        ))
    }

    /// Out-of-sample statistics across every validation of every window
    fn aggregate_metrics(&self, windows: &[WindowReport]) -> HashMap<String, f64> {
        let mut aggregated = HashMap::new();

        let validations: Vec<&WindowValidation> =
            windows.iter().flat_map(|w| w.validations.iter()).collect();
        if validations.is_empty() {
            return aggregated;
        }

        let metric_names: BTreeSet<&String> = validations
            .iter()
            .flat_map(|v| v.out_of_sample.metrics.keys())
            .collect();

        for metric_name in metric_names {
            let values: Vec<f64> = validations
                .iter()
                .filter_map(|v| v.out_of_sample.metrics.get(metric_name).copied())
                .collect();

            if !values.is_empty() {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let std = calculate_std(&values, mean);

                aggregated.insert(format!("{}_mean", metric_name), mean);
                aggregated.insert(format!("{}_std", metric_name), std);
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                aggregated.insert(format!("{}_min", metric_name), min);
                aggregated.insert(format!("{}_max", metric_name), max);
            }
        }

        // Filtered validations would swamp the spread
        let scores: Vec<f64> = validations
            .iter()
            .map(|v| v.out_of_sample_score)
            .filter(|s| *s > FILTERED_SCORE)
            .collect();
        if !scores.is_empty() {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            let consistency = 1.0 / (1.0 + calculate_std(&scores, mean));
            aggregated.insert("consistency_score".to_string(), consistency);
        }

        aggregated
    }
}

impl ValidationMethod for WalkForwardDriver {
    fn name(&self) -> &str {
        "Walk-Forward Optimization"
    }

    fn run(&self, callback: &mut dyn ProgressCallback) -> Result<WalkForwardReport> {
        let windows = self.windows()?;
        if windows.is_empty() {
            return Err(OptimizerError::Validation(
                "date range is shorter than one in-sample period".to_string(),
            ));
        }
        log::info!("Walk-forward over {} windows", windows.len());

        let started = Instant::now();
        let mut reports = Vec::with_capacity(windows.len());
        for window in &windows {
            reports.push(self.search_window(window, callback)?);
        }

        let aggregate_metrics = self.aggregate_metrics(&reports);
        log::info!(
            "Walk-forward finished {} windows in {:.1}s",
            reports.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(WalkForwardReport {
            method: self.name().to_string(),
            windows: reports,
            aggregate_metrics,
        })
    }
}

fn calculate_std(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}
