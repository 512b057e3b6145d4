use crate::coefficients::CoefficientStore;
use crate::region::ClusterScaling;
use crate::source::DEFAULT_BASE_VALUE;
use crate::state::DemoPolicy;
use crate::variable::{Variable, VariableError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---- Settings file ----
// Every field may be left out of the TOML file; missing ones take the built-in default.

/// Simulator settings loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// National mean outcome used when no live value is available.
    pub base_value: f64,
    /// Dashboard snapshot (JSON) to refresh coefficients and baselines from.
    pub snapshot: Option<PathBuf>,
    /// Coefficient table (CSV), used when no snapshot is configured.
    pub beta_csv: Option<PathBuf>,
    /// Coefficient overrides, keyed by variable name (e.g. `NEET = 0.0056`).
    pub coefficients: BTreeMap<String, f64>,
    pub region: ClusterScaling,
    pub demo: DemoPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_value: DEFAULT_BASE_VALUE,
            snapshot: None,
            beta_csv: None,
            coefficients: BTreeMap::new(),
            region: ClusterScaling::default(),
            demo: DemoPolicy::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid coefficient override: {0}")]
    UnknownVariable(#[from] VariableError),
    #[error("Base value must be finite and non-negative, but was {0}.")]
    InvalidBaseValue(f64),
}

/// Accepts a base value only if it is a usable outcome level.
pub fn check_base_value(value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidBaseValue(value))
    }
}

impl SimulatorConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration in TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Rejects settings that a hand-edited file can get wrong. Unlike data delivered by a
    /// live source, a configuration file is under the user's control, so mistakes here
    /// are reported instead of skipped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_base_value(self.base_value)?;
        for name in self.coefficients.keys() {
            name.parse::<Variable>()?;
        }
        Ok(())
    }

    /// Merges this file's coefficient overrides into `store`. Overrides are applied
    /// last, so they win over both the defaults and anything a live source delivered.
    pub fn apply_overrides(&self, store: &mut CoefficientStore) -> usize {
        store.update_named(self.coefficients.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: SimulatorConfig = toml::from_str("").unwrap();
        assert_eq!(config, SimulatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: SimulatorConfig = toml::from_str(
            r#"
            base_value = 0.4

            [region]
            step = 0.2

            [demo]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.base_value, 0.4);
        assert_eq!(config.region.offset, 0.8);
        assert_eq!(config.region.step, 0.2);
        assert!(!config.demo.enabled);
        assert_eq!(config.demo.variable, Variable::Neet);
    }

    #[test]
    fn unknown_override_is_rejected() {
        let mut config = SimulatorConfig::default();
        config.coefficients.insert("GDP".to_string(), 0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownVariable(_))
        ));
    }

    #[test]
    fn negative_base_is_rejected() {
        let config = SimulatorConfig {
            base_value: -0.1,
            ..SimulatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseValue(_))
        ));
    }

    #[test]
    fn base_value_check_accepts_zero_and_rejects_nan() {
        assert_eq!(check_base_value(0.0).unwrap(), 0.0);
        assert_eq!(check_base_value(0.35).unwrap(), 0.35);
        assert!(check_base_value(-0.1).is_err());
        assert!(check_base_value(f64::NAN).is_err());
    }

    #[test]
    fn overrides_reach_the_store() {
        let mut config = SimulatorConfig::default();
        config.coefficients.insert("Internet".to_string(), -0.2);
        let mut store = CoefficientStore::with_defaults();
        assert_eq!(config.apply_overrides(&mut store), 1);
        assert_eq!(store.get(Variable::Internet), -0.2);
        assert_eq!(store.get(Variable::Neet), 0.0056);
        assert!(store.is_refreshed());
    }
}
