use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tradebias_optimizer::config::{BackendKind, ConfigManager};
use tradebias_optimizer::engines::evaluation::{ProcessEvaluator, ScoreCalculator};
use tradebias_optimizer::engines::execution::BackendFactory;
use tradebias_optimizer::engines::generation::{
    ConsoleProgressCallback, ValidationMethod, WalkForwardDriver,
};

#[derive(Parser)]
#[command(author, version, about = "Evolutionary walk-forward parameter search", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured execution backend
    /// (sequential, local_parallel, remote_batch)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Write the walk-forward report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Validate the configuration, print the windows and exit
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let manager = ConfigManager::new();
    manager
        .load_from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(backend) = cli.backend {
        manager.update(|config| config.execution.backend = backend)?;
    }
    let config = manager.get();
    config.validate().context("invalid configuration")?;

    let scorer = ScoreCalculator::new(&config.scoring);
    let evaluator = Arc::new(ProcessEvaluator::new(config.evaluator.clone(), scorer));
    let backends = BackendFactory::new(config.execution.clone(), evaluator);
    let driver = WalkForwardDriver::new(&config, backends)?;

    if cli.check {
        for window in driver.windows()? {
            println!(
                "window {}: in-sample {} validation {}",
                window.index, window.in_sample, window.validation
            );
        }
        return Ok(());
    }

    log::info!(
        "Running {} genes on the {:?} backend",
        config.genes.len(),
        config.execution.backend
    );
    let report = driver
        .run(&mut ConsoleProgressCallback)
        .context("walk-forward run failed")?;

    let json = serde_json::to_string_pretty(&report)?;
    match cli.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
