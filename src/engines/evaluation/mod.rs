pub mod evaluator;
pub mod process;
pub mod scoring;

pub use evaluator::{evaluate_isolated, Evaluation, FitnessEvaluator};
pub use process::ProcessEvaluator;
pub use scoring::ScoreCalculator;
