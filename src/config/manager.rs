use super::{
    evaluator::EvaluatorConfig,
    evolution::EvolutionConfig,
    execution::ExecutionConfig,
    scoring::ScoringConfig,
    termination::TerminationConfig,
    traits::ConfigSection,
    walk_forward::WalkForwardConfig,
};
use crate::engines::generation::gene_spec::GeneSpec;
use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment variables that override file values,
/// e.g. `TRADEBIAS__EXECUTION__BACKEND=sequential`
pub const ENV_PREFIX: &str = "TRADEBIAS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub termination: TerminationConfig,
    pub execution: ExecutionConfig,
    pub walk_forward: WalkForwardConfig,
    pub scoring: ScoringConfig,
    pub evaluator: EvaluatorConfig,
    pub genes: Vec<GeneSpec>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), OptimizerError> {
        self.evolution.validate()?;
        self.termination.validate()?;
        self.execution.validate()?;
        self.walk_forward.validate()?;
        self.scoring.validate()?;
        self.evaluator.validate()?;
        self.validate_genes()
    }

    fn validate_genes(&self) -> Result<(), OptimizerError> {
        if self.genes.is_empty() {
            return Err(OptimizerError::InvalidSpec(
                "at least one gene spec is required".to_string(),
            ));
        }
        let mut keys = HashSet::new();
        for spec in &self.genes {
            spec.domain()?;
            if !keys.insert(spec.key.as_str()) {
                return Err(OptimizerError::InvalidSpec(format!(
                    "duplicate gene key '{}'",
                    spec.key
                )));
            }
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a TOML or JSON file, apply environment overrides and validate
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), OptimizerError> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                OptimizerError::Configuration(format!(
                    "Failed to read config {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| OptimizerError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        log::info!("Loaded configuration from {}", path.display());
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), OptimizerError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| OptimizerError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| OptimizerError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn update<F>(&self, f: F) -> Result<(), OptimizerError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        candidate.validate()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = candidate;
        Ok(())
    }
}
