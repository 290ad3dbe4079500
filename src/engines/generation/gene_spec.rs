use crate::error::{OptimizerError, Result};
use crate::types::GeneValue;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper bound on values produced by exhaustive enumeration of a single gene
const MAX_ENUMERATED_VALUES: usize = 1_000_000;

/// Declarative description of one searchable parameter.
///
/// Exactly one of the integer or decimal bound pairs must be set. A `step`
/// marks the gene for exhaustive (cartesian) enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSpec {
    pub key: String,
    #[serde(default)]
    pub int_min: Option<i64>,
    #[serde(default)]
    pub int_max: Option<i64>,
    #[serde(default)]
    pub decimal_min: Option<Decimal>,
    #[serde(default)]
    pub decimal_max: Option<Decimal>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub step: Option<Decimal>,
    #[serde(default)]
    pub alternative_distribution: bool,
}

/// Resolved, validated form of a [`GeneSpec`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneDomain {
    Int {
        min: i64,
        max: i64,
        step: Option<i64>,
    },
    Decimal {
        min: Decimal,
        max: Decimal,
        precision: u32,
        step: Option<Decimal>,
    },
}

impl GeneSpec {
    pub fn int(key: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            key: key.into(),
            int_min: Some(min),
            int_max: Some(max),
            decimal_min: None,
            decimal_max: None,
            precision: None,
            step: None,
            alternative_distribution: false,
        }
    }

    pub fn decimal(key: impl Into<String>, min: Decimal, max: Decimal) -> Self {
        Self {
            key: key.into(),
            int_min: None,
            int_max: None,
            decimal_min: Some(min),
            decimal_max: Some(max),
            precision: None,
            step: None,
            alternative_distribution: false,
        }
    }

    pub fn with_step(mut self, step: Decimal) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_alternative_distribution(mut self) -> Self {
        self.alternative_distribution = true;
        self
    }

    pub fn has_step(&self) -> bool {
        self.step.is_some()
    }

    pub fn domain(&self) -> Result<GeneDomain> {
        let has_int = self.int_min.is_some() || self.int_max.is_some();
        let has_decimal = self.decimal_min.is_some() || self.decimal_max.is_some();

        match (has_int, has_decimal) {
            (false, false) => Err(self.invalid("neither integer nor decimal bounds are set")),
            (true, true) => Err(self.invalid("both integer and decimal bounds are set")),
            (true, false) => {
                let (min, max) = match (self.int_min, self.int_max) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err(self.invalid("integer bounds need both min and max")),
                };
                if min > max {
                    return Err(self.invalid(&format!("min {} exceeds max {}", min, max)));
                }
                let step = match self.step {
                    Some(step) => {
                        if step <= Decimal::ZERO || step.fract() != Decimal::ZERO {
                            return Err(
                                self.invalid("integer step must be a positive whole number")
                            );
                        }
                        let step = step
                            .to_i64()
                            .ok_or_else(|| self.invalid("integer step out of range"))?;
                        Some(step)
                    }
                    None => None,
                };
                Ok(GeneDomain::Int { min, max, step })
            }
            (false, true) => {
                let (min, max) = match (self.decimal_min, self.decimal_max) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err(self.invalid("decimal bounds need both min and max")),
                };
                if min > max {
                    return Err(self.invalid(&format!("min {} exceeds max {}", min, max)));
                }
                if let Some(step) = self.step {
                    if step <= Decimal::ZERO {
                        return Err(self.invalid("decimal step must be positive"));
                    }
                }
                let precision = self
                    .precision
                    .unwrap_or_else(|| min.scale().max(max.scale()));
                Ok(GeneDomain::Decimal {
                    min,
                    max,
                    precision,
                    step: self.step,
                })
            }
        }
    }

    /// Whether `value` has the declared type and lies inside the bounds
    pub fn contains(&self, value: &GeneValue) -> Result<bool> {
        Ok(match (self.domain()?, value) {
            (GeneDomain::Int { min, max, .. }, GeneValue::Int(v)) => *v >= min && *v <= max,
            (GeneDomain::Decimal { min, max, .. }, GeneValue::Decimal(v)) => *v >= min && *v <= max,
            _ => false,
        })
    }

    /// Every value of a stepped domain, in ascending order
    pub fn enumerate(&self) -> Result<Vec<GeneValue>> {
        let mut values = Vec::new();
        match self.domain()? {
            GeneDomain::Int { min, max, step: Some(step) } => {
                let mut v = min;
                while v <= max {
                    values.push(GeneValue::Int(v));
                    if values.len() > MAX_ENUMERATED_VALUES {
                        return Err(self.invalid("step produces too many values"));
                    }
                    v = match v.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
            }
            GeneDomain::Decimal { min, max, step: Some(step), .. } => {
                let mut v = min;
                while v <= max {
                    values.push(GeneValue::Decimal(v));
                    if values.len() > MAX_ENUMERATED_VALUES {
                        return Err(self.invalid("step produces too many values"));
                    }
                    v = match v.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
            }
            _ => return Err(self.invalid("enumeration requires a step")),
        }
        Ok(values)
    }

    fn invalid(&self, reason: &str) -> OptimizerError {
        OptimizerError::InvalidSpec(format!("gene '{}': {}", self.key, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_bounds_is_invalid() {
        let spec = GeneSpec {
            key: "fast".to_string(),
            int_min: None,
            int_max: None,
            decimal_min: None,
            decimal_max: None,
            precision: None,
            step: None,
            alternative_distribution: false,
        };
        assert!(matches!(spec.domain(), Err(OptimizerError::InvalidSpec(_))));
    }

    #[test]
    fn test_both_bounds_is_invalid() {
        let mut spec = GeneSpec::int("fast", 1, 10);
        spec.decimal_min = Some(dec!(0.1));
        spec.decimal_max = Some(dec!(0.9));
        assert!(matches!(spec.domain(), Err(OptimizerError::InvalidSpec(_))));
    }

    #[test]
    fn test_precision_inferred_from_bounds() {
        let spec = GeneSpec::decimal("threshold", dec!(0.5), dec!(2.125));
        match spec.domain().unwrap() {
            GeneDomain::Decimal { precision, .. } => assert_eq!(precision, 3),
            other => panic!("unexpected domain {:?}", other),
        }
    }

    #[test]
    fn test_enumerate_stepped_domains() {
        let ints = GeneSpec::int("period", 10, 20).with_step(dec!(5));
        assert_eq!(
            ints.enumerate().unwrap(),
            vec![GeneValue::Int(10), GeneValue::Int(15), GeneValue::Int(20)]
        );

        let decimals = GeneSpec::decimal("ratio", dec!(0.1), dec!(0.35)).with_step(dec!(0.1));
        assert_eq!(decimals.enumerate().unwrap().len(), 3);

        assert!(GeneSpec::int("period", 1, 3).enumerate().is_err());
    }

    #[test]
    fn test_contains_checks_type_and_bounds() {
        let spec = GeneSpec::int("period", 1, 10);
        assert!(spec.contains(&GeneValue::Int(1)).unwrap());
        assert!(!spec.contains(&GeneValue::Int(11)).unwrap());
        assert!(!spec.contains(&GeneValue::Decimal(dec!(5))).unwrap());
    }
}
