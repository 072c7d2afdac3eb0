//! # Run Configuration
//!
//! Every knob of a run lives in one TOML document. All sections are optional;
//! omitted fields fall back to the smoker/alcoholic/pregnant → "breast cancer"
//! defaults, so an empty file (or no file at all) works once a data path is
//! supplied.
//!
//! ```toml
//! [data]
//! path = "sample_data.csv"
//! features = ["smoker", "alcoholic", "pregnant"]
//! target = "breast cancer"
//!
//! [model]
//! solver = "irls"
//! c = 1.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FEATURES: [&str; 3] = ["smoker", "alcoholic", "pregnant"];
pub const DEFAULT_TARGET: &str = "breast cancer";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error(
        "No input data path was given. Pass it as the first argument or set 'path' in the [data] section."
    )]
    MissingDataPath,
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Optimizer used to maximise the (penalized) likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Newton steps via iteratively reweighted least squares.
    Irls,
    /// Quasi-Newton minimisation of the penalized negative log-likelihood.
    Bfgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    /// Ridge penalty `||w||^2 / (2C)` on the coefficients; the intercept is never penalized.
    L2,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataSettings,
    pub model: ModelSettings,
    pub synthetic: SyntheticSettings,
    pub evaluation: EvaluationSettings,
    pub plot: PlotSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub path: Option<PathBuf>,
    /// Field separator. Inferred from the file extension when absent.
    pub separator: Option<char>,
    pub features: Vec<String>,
    pub target: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path: None,
            separator: None,
            features: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub solver: Solver,
    pub penalty: Penalty,
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            solver: Solver::Irls,
            penalty: Penalty::L2,
            c: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

impl ModelSettings {
    /// Ridge strength applied to the coefficients, zero when unpenalized.
    pub fn ridge_lambda(&self) -> f64 {
        match self.penalty {
            Penalty::L2 => 1.0 / self.c,
            Penalty::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub count: usize,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self { count: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Number of leading training rows re-scored for the accuracy report.
    pub rows: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { rows: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub show: bool,
    pub html_path: Option<PathBuf>,
    /// Program that opens the HTML chart. Defaults to the platform opener.
    pub viewer: Option<String>,
    pub samples: usize,
    pub x_min: f64,
    pub x_max: f64,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            show: true,
            html_path: None,
            viewer: None,
            samples: 1000,
            x_min: -10.0,
            x_max: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Optional TSV export of the per-ID prediction table.
    pub predictions: Option<PathBuf>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&toml_string)?;
        Ok(config)
    }

    /// The configured input path, or `MissingDataPath` if none was set.
    pub fn data_path(&self) -> Result<&Path, ConfigError> {
        self.data
            .path
            .as_deref()
            .ok_or(ConfigError::MissingDataPath)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.features.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "data.features",
                reason: "at least one feature column is required".to_string(),
            });
        }
        if self.data.features.iter().any(|f| f == &self.data.target) {
            return Err(ConfigError::InvalidValue {
                field: "data.target",
                reason: format!("'{}' is also listed as a feature", self.data.target),
            });
        }
        if let Some(separator) = self.data.separator {
            if !separator.is_ascii() {
                return Err(ConfigError::InvalidValue {
                    field: "data.separator",
                    reason: format!("must be a single ASCII character, got {separator:?}"),
                });
            }
        }
        if self.model.penalty == Penalty::L2 && !(self.model.c.is_finite() && self.model.c > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "model.c",
                reason: format!("must be a positive finite number, got {}", self.model.c),
            });
        }
        if self.model.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.model.tolerance > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "model.tolerance",
                reason: format!("must be positive, got {}", self.model.tolerance),
            });
        }
        if self.evaluation.rows == 0 {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.rows",
                reason: "at least one row must be scored to report accuracy".to_string(),
            });
        }
        if self.plot.samples < 2 {
            return Err(ConfigError::InvalidValue {
                field: "plot.samples",
                reason: "at least two samples are needed to draw a curve".to_string(),
            });
        }
        if !(self.plot.x_min < self.plot.x_max) {
            return Err(ConfigError::InvalidValue {
                field: "plot.x_min",
                reason: format!(
                    "domain [{}, {}] is empty",
                    self.plot.x_min, self.plot.x_max
                ),
            });
        }
        Ok(())
    }
}
