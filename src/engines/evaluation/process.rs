//! Evaluator that runs the backtest as a separate OS process.
//!
//! Each evaluation spawns the configured command, writes a JSON request on
//! its stdin and reads a flat JSON object of numeric statistics from stdout:
//!
//! ```text
//! stdin:  {"genes": {"fast": 12, "threshold": 0.75}, "start": "2024-01-01", "end": "2024-01-30"}
//! stdout: {"sharpe_ratio": 1.4, "num_trades": 31, "return_pct": 12.5}
//! ```
//!
//! Non-finite statistics may be written as the strings `"inf"`, `"-inf"` or
//! `"NaN"`. A crash of the backtest only takes down its own process.

use crate::config::evaluator::EvaluatorConfig;
use crate::engines::evaluation::evaluator::{Evaluation, FitnessEvaluator};
use crate::engines::evaluation::scoring::ScoreCalculator;
use crate::error::{OptimizerError, Result};
use crate::types::{non_finite, DateWindow, Gene, GeneValue};
use anyhow::{bail, Context};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

pub struct ProcessEvaluator {
    config: EvaluatorConfig,
    scorer: ScoreCalculator,
}

impl ProcessEvaluator {
    pub fn new(config: EvaluatorConfig, scorer: ScoreCalculator) -> Self {
        Self { config, scorer }
    }

    pub fn request(genes: &[Gene], window: &DateWindow) -> Value {
        let genes: Map<String, Value> = genes
            .iter()
            .map(|g| {
                let value = match g.value {
                    GeneValue::Int(v) => json!(v),
                    GeneValue::Decimal(_) => json!(g.value.as_f64()),
                };
                (g.key.clone(), value)
            })
            .collect();

        json!({
            "genes": genes,
            "start": window.start.to_string(),
            "end": window.end.to_string(),
        })
    }

    fn run(&self, request: &Value) -> anyhow::Result<HashMap<String, f64>> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.config.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.to_string().as_bytes())
                .context("failed to write request to evaluator stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("failed to wait for evaluator process")?;

        if !output.status.success() {
            bail!(
                "evaluator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let mut deserializer = serde_json::Deserializer::from_slice(&output.stdout);
        let metrics = non_finite::map::deserialize(&mut deserializer)
            .and_then(|metrics| deserializer.end().map(|_| metrics))
            .context("evaluator output is not a flat JSON object of numbers")?;
        Ok(metrics)
    }
}

impl FitnessEvaluator for ProcessEvaluator {
    fn evaluate(&self, genes: &[Gene], window: &DateWindow) -> Result<Evaluation> {
        let request = Self::request(genes, window);
        let metrics = self
            .run(&request)
            .map_err(|e| OptimizerError::Evaluation(format!("{:#}", e)))?;
        Ok(self.scorer.evaluate(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::scoring::ScoringConfig;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap(),
        )
    }

    #[test]
    fn test_request_shape() {
        let genes = vec![
            Gene::new("fast", GeneValue::Int(12)),
            Gene::new("threshold", GeneValue::Decimal(dec!(0.75))),
        ];
        let request = ProcessEvaluator::request(&genes, &window());
        assert_eq!(request["genes"]["fast"], json!(12));
        assert_eq!(request["genes"]["threshold"], json!(0.75));
        assert_eq!(request["start"], json!("2024-01-01"));
        assert_eq!(request["end"], json!("2024-01-30"));
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_statistics_from_stdout() {
        let evaluator = ProcessEvaluator::new(
            EvaluatorConfig {
                command: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    r#"cat > /dev/null; echo '{"sharpe_ratio": 1.5, "num_trades": 12}'"#
                        .to_string(),
                ],
                working_dir: None,
            },
            ScoreCalculator::new(&ScoringConfig::default()),
        );

        let evaluation = evaluator.evaluate(&[], &window()).unwrap();
        assert_eq!(evaluation.score, 1.5);
        assert_eq!(evaluation.metrics.get("num_trades"), Some(&12.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_non_finite_statistics() {
        let evaluator = ProcessEvaluator::new(
            EvaluatorConfig {
                command: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    r#"cat > /dev/null; echo '{"sharpe_ratio": 0.8, "profit_factor": "inf"}'"#
                        .to_string(),
                ],
                working_dir: None,
            },
            ScoreCalculator::new(&ScoringConfig::default()),
        );

        let evaluation = evaluator.evaluate(&[], &window()).unwrap();
        assert_eq!(evaluation.score, 0.8);
        assert_eq!(evaluation.metrics["profit_factor"], f64::INFINITY);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_evaluation_error() {
        let evaluator = ProcessEvaluator::new(
            EvaluatorConfig {
                command: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    "cat > /dev/null; echo broken >&2; exit 3".to_string(),
                ],
                working_dir: None,
            },
            ScoreCalculator::new(&ScoringConfig::default()),
        );

        match evaluator.evaluate(&[], &window()) {
            Err(OptimizerError::Evaluation(message)) => assert!(message.contains("broken")),
            other => panic!("expected evaluation error, got {:?}", other),
        }
    }
}
