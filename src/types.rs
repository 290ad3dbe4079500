use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Score given to evaluations that failed, were filtered out, or crashed.
pub const FILTERED_SCORE: f64 = -1.0e9;

/// A single parameter value. Integers and decimals never compare equal to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneValue {
    Int(i64),
    Decimal(Decimal),
}

impl GeneValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            GeneValue::Int(v) => *v as f64,
            GeneValue::Decimal(d) => d.to_f64().unwrap_or(0.0),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            GeneValue::Int(_) => "int",
            GeneValue::Decimal(_) => "decimal",
        }
    }
}

impl fmt::Display for GeneValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneValue::Int(v) => write!(f, "{}", v),
            GeneValue::Decimal(d) => write!(f, "{}", d),
        }
    }
}

/// One named parameter of a candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gene {
    pub key: String,
    pub value: GeneValue,
}

impl Gene {
    pub fn new(key: impl Into<String>, value: GeneValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Inclusive calendar date range handed to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Raw statistics produced by one evaluation, plus the window they cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(with = "non_finite::map")]
    pub metrics: HashMap<String, f64>,
    pub window: DateWindow,
}

/// Serde adapters for statistics that may be infinite or NaN.
///
/// JSON has no literal for those values and `serde_json` would write `null`,
/// so they travel as the strings `"inf"`, `"-inf"` and `"NaN"`.
pub mod non_finite {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Number {
        Finite(f64),
        Text(String),
    }

    impl From<f64> for Number {
        fn from(value: f64) -> Self {
            if value.is_finite() {
                Number::Finite(value)
            } else {
                Number::Text(value.to_string())
            }
        }
    }

    impl Number {
        fn into_f64<E: Error>(self) -> Result<f64, E> {
            match self {
                Number::Finite(value) => Ok(value),
                Number::Text(text) => text
                    .parse()
                    .map_err(|_| E::custom(format!("invalid number '{}'", text))),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Number::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Number::deserialize(deserializer)?.into_f64()
    }

    pub mod map {
        use super::Number;
        use serde::{Deserialize, Deserializer, Serializer};
        use std::collections::HashMap;

        pub fn serialize<S: Serializer>(
            values: &HashMap<String, f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_map(values.iter().map(|(k, v)| (k, Number::from(*v))))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<HashMap<String, f64>, D::Error> {
            HashMap::<String, Number>::deserialize(deserializer)?
                .into_iter()
                .map(|(k, v)| Ok((k, v.into_f64()?)))
                .collect()
        }
    }
}
