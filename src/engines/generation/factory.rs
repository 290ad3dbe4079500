//! Candidate generation from declarative gene specs.
//!
//! Random mode draws each gene independently inside its bounds; cartesian
//! (brute-force) mode walks every combination of stepped domains.

use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::gene_spec::{GeneDomain, GeneSpec};
use crate::error::{OptimizerError, Result};
use crate::types::{Gene, GeneValue};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Largest scale `rust_decimal` can represent
const MAX_PRECISION: u32 = 28;

/// Draw one value for `spec`, failing if its domain is malformed
pub fn generate_value<R: Rng>(spec: &GeneSpec, rng: &mut R) -> Result<GeneValue> {
    let domain = spec.domain()?;
    Ok(random_value(&domain, spec.alternative_distribution, rng))
}

pub fn random_value<R: Rng>(domain: &GeneDomain, alternative: bool, rng: &mut R) -> GeneValue {
    match *domain {
        GeneDomain::Int { min, max, .. } => {
            if min == max {
                return GeneValue::Int(min);
            }
            let value = if alternative {
                let span = max as f64 - min as f64;
                let sampled = sample_centered(min as f64, span, rng).round() as i64;
                sampled.clamp(min, max)
            } else {
                rng.gen_range(min..=max)
            };
            GeneValue::Int(value)
        }
        GeneDomain::Decimal { min, max, precision, .. } => {
            if min == max {
                return GeneValue::Decimal(min);
            }
            let precision = precision.min(MAX_PRECISION);
            let unit = Decimal::from_i128_with_scale(1, precision);

            let value = match tick_count(min, max, unit) {
                Some(ticks) => {
                    let tick = draw_tick(ticks, alternative, rng);
                    min + Decimal::from(tick) * unit
                }
                // Too many ticks to count: draw a position along the range instead
                None => {
                    let tick = draw_tick(i64::MAX, alternative, rng);
                    interpolate(min, max, tick, i64::MAX)
                }
            };
            GeneValue::Decimal(value.round_dp(precision).clamp(min, max))
        }
    }
}

/// Whole `unit` steps between `min` and `max`, if they fit in an `i64`
fn tick_count(min: Decimal, max: Decimal, unit: Decimal) -> Option<i64> {
    max.checked_sub(min)?.checked_div(unit)?.floor().to_i64()
}

fn draw_tick<R: Rng>(ticks: i64, alternative: bool, rng: &mut R) -> i64 {
    if ticks <= 0 {
        0
    } else if alternative {
        let sampled = sample_centered(0.0, ticks as f64, rng).round();
        // `as` saturates, so the clamp also covers draws beyond i64
        (sampled as i64).clamp(0, ticks)
    } else {
        rng.gen_range(0..=ticks)
    }
}

/// Point `tick / ticks` of the way from `min` to `max`; both ends are exact
fn interpolate(min: Decimal, max: Decimal, tick: i64, ticks: i64) -> Decimal {
    let fraction = Decimal::from(tick)
        .checked_div(Decimal::from(ticks))
        .unwrap_or(Decimal::ZERO);
    let low = min.checked_mul(Decimal::ONE - fraction);
    let high = max.checked_mul(fraction);
    match (low, high) {
        (Some(low), Some(high)) => low.checked_add(high).unwrap_or(min),
        _ => min,
    }
}

/// Normal draw centred on the middle of `[low, low + span]`
fn sample_centered<R: Rng>(low: f64, span: f64, rng: &mut R) -> f64 {
    let mean = low + span / 2.0;
    match Normal::new(mean, span / 4.0) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

/// Builds candidates for a fixed, validated list of gene specs
#[derive(Debug, Clone)]
pub struct CandidateFactory {
    specs: Vec<GeneSpec>,
    domains: Vec<GeneDomain>,
}

impl CandidateFactory {
    pub fn new(specs: Vec<GeneSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(OptimizerError::InvalidSpec(
                "at least one gene spec is required".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.key.as_str()) {
                return Err(OptimizerError::InvalidSpec(format!(
                    "duplicate gene key '{}'",
                    spec.key
                )));
            }
        }
        let domains = specs
            .iter()
            .map(GeneSpec::domain)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specs, domains })
    }

    pub fn specs(&self) -> &[GeneSpec] {
        &self.specs
    }

    pub fn gene_count(&self) -> usize {
        self.specs.len()
    }

    /// Fresh random value for the gene at `index`
    pub fn value_at<R: Rng>(&self, index: usize, rng: &mut R) -> GeneValue {
        random_value(
            &self.domains[index],
            self.specs[index].alternative_distribution,
            rng,
        )
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> Candidate {
        let genes = self
            .specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Gene::new(spec.key.clone(), self.value_at(i, rng)))
            .collect();
        Candidate::new(genes)
    }

    pub fn random_batch<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Candidate> {
        (0..count).map(|_| self.generate(rng)).collect()
    }

    /// Exhaustive enumeration; every spec must declare a step
    pub fn cartesian(&self) -> Result<CartesianEnumerator> {
        let values = self
            .specs
            .iter()
            .map(GeneSpec::enumerate)
            .collect::<Result<Vec<_>>>()?;
        Ok(CartesianEnumerator::new(
            self.specs.iter().map(|s| s.key.clone()).collect(),
            values,
        ))
    }
}

/// Odometer-style walk over the product of per-gene value sets
pub struct CartesianEnumerator {
    keys: Vec<String>,
    values: Vec<Vec<GeneValue>>,
    indices: Vec<usize>,
    exhausted: bool,
}

impl CartesianEnumerator {
    fn new(keys: Vec<String>, values: Vec<Vec<GeneValue>>) -> Self {
        let exhausted = values.iter().any(Vec::is_empty);
        let indices = vec![0; values.len()];
        Self {
            keys,
            values,
            indices,
            exhausted,
        }
    }

    pub fn total(&self) -> usize {
        self.values.iter().map(Vec::len).product()
    }
}

impl Iterator for CartesianEnumerator {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.exhausted {
            return None;
        }

        let genes = self
            .keys
            .iter()
            .zip(&self.values)
            .zip(&self.indices)
            .map(|((key, values), &i)| Gene::new(key.clone(), values[i]))
            .collect();

        // Advance the last position fastest
        let mut pos = self.indices.len();
        loop {
            if pos == 0 {
                self.exhausted = true;
                break;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.values[pos].len() {
                break;
            }
            self.indices[pos] = 0;
        }

        Some(Candidate::new(genes))
    }
}
