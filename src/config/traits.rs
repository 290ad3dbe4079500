use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), OptimizerError>;
}

pub(crate) fn invalid<T: ConfigSection>(message: &str) -> OptimizerError {
    OptimizerError::Configuration(format!("[{}] {}", T::section_name(), message))
}
