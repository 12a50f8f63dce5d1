use likelihood::{LimitMethod, Maximizer, Systematics};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Description of a likelihood analysis.
///
/// Relative paths are relative to the directory of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Exported response matrices, one per systematic variation.
    pub response_matrices: Vec<PathBuf>,
    /// Measured reco bin counts.
    pub data: Option<Vec<f64>>,
    /// CSV file of measured events, filled into `reco_binning`.
    pub data_events: Option<PathBuf>,
    pub reco_binning: Option<PathBuf>,
    pub weight_field: Option<String>,
    pub systematics: Systematics,
    pub limit_method: LimitMethod,
    pub truth_limits: Option<Vec<f64>>,
    pub efficiency_threshold: f64,
    /// Number of toy data sets for p-values.
    pub toys: usize,
    pub seed: u64,
    pub maximizer: Maximizer,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            response_matrices: Vec::new(),
            data: None,
            data_events: None,
            reco_binning: None,
            weight_field: None,
            systematics: Systematics::Profile,
            limit_method: LimitMethod::Raise,
            truth_limits: None,
            efficiency_threshold: 0.0,
            toys: 2500,
            seed: 0,
            maximizer: Maximizer::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.relative_to(base))
    }

    /// Resolve relative paths against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.response_matrices = self.response_matrices.into_iter().map(resolve).collect();
        self.data_events = self.data_events.map(resolve);
        self.reco_binning = self.reco_binning.map(resolve);
        self
    }

    pub fn with_response_matrix(mut self, path: impl Into<PathBuf>) -> Self {
        self.response_matrices.push(path.into());
        self
    }

    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_data_events(
        mut self,
        events: impl Into<PathBuf>,
        reco_binning: impl Into<PathBuf>,
    ) -> Self {
        self.data_events = Some(events.into());
        self.reco_binning = Some(reco_binning.into());
        self
    }

    pub fn with_weight_field(mut self, field: impl Into<String>) -> Self {
        self.weight_field = Some(field.into());
        self
    }

    pub fn with_systematics(mut self, systematics: Systematics) -> Self {
        self.systematics = systematics;
        self
    }

    pub fn with_limit_method(mut self, method: LimitMethod) -> Self {
        self.limit_method = method;
        self
    }

    pub fn with_truth_limits(mut self, limits: Vec<f64>) -> Self {
        self.truth_limits = Some(limits);
        self
    }

    pub fn with_efficiency_threshold(mut self, threshold: f64) -> Self {
        self.efficiency_threshold = threshold;
        self
    }

    pub fn with_toys(mut self, toys: usize) -> Self {
        self.toys = toys;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_maximizer(mut self, maximizer: Maximizer) -> Self {
        self.maximizer = maximizer;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.response_matrices.is_empty() {
            return Err("At least one response matrix is required".to_string());
        }

        match (&self.data, &self.data_events) {
            (Some(_), Some(_)) => {
                return Err("Only one of data and data_events can be given".to_string());
            }
            (None, None) => return Err("Either data or data_events is required".to_string()),
            (Some(data), None) => {
                if data.iter().any(|&d| !d.is_finite() || d < 0.0) {
                    return Err("Data must be finite and non-negative".to_string());
                }
            }
            (None, Some(_)) => {
                if self.reco_binning.is_none() {
                    return Err("data_events requires a reco_binning".to_string());
                }
            }
        }

        if let Some(limits) = &self.truth_limits {
            if limits.iter().any(|&l| l.is_nan() || l < 0.0) {
                return Err("Truth limits must be non-negative".to_string());
            }
        }

        if !(0.0..1.0).contains(&self.efficiency_threshold) {
            return Err("Efficiency threshold must be in [0, 1)".to_string());
        }

        if self.toys == 0 {
            return Err("Number of toys must be greater than 0".to_string());
        }

        Ok(())
    }
}
