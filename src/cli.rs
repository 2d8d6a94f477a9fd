//! CLI argument types and layered configuration for the `densep` binary.
//! Loads from CLI args, environment (prefix `DENSEP_`), and optional config
//! files.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ndarray::{Array2, Array3, Axis};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{AggregationError, aggregate_probas};
use crate::config::{AggregationConfig, ConfigError};

/// Command-line arguments for the `densep` binary.
///
/// `densep` reads per-window logits of overlapping sequences from a JSON file
/// and prints the aggregated dense log-probabilities. Values are loaded from
/// command line arguments, environment variables (prefixed with `DENSEP_`),
/// and an optional configuration file.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use dense_windows::cli::DensepArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = DensepArgs::load_from_iter(["densep", "--n-windows-stride", "3", "--argmax=true"])
///     .expect("load args from CLI iterator");
/// assert_eq!(args.n_windows_stride, 3);
/// assert!(args.argmax);
/// ```
///
/// Load from a configuration file:
/// ```
/// use dense_windows::cli::DensepArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "n_windows_stride = 2").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = DensepArgs::load_from_iter(["densep", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.n_windows_stride, 2);
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "DENSEP")]
pub struct DensepArgs {
    /// JSON file holding logits shaped `(n_sequences, n_classes, n_windows)`.
    #[serde(default)]
    pub logits: Option<PathBuf>,

    /// Windows between the starts of consecutive sequences.
    #[ortho_config(default = 1)]
    #[serde(default = "default_stride")]
    pub n_windows_stride: usize,

    /// Print the winning class per timestep instead of log-probabilities.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub argmax: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

const fn default_stride() -> usize {
    1
}

impl DensepArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed("DENSEP_"))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DENSEP_"))
            .extract()
            .map_err(Into::into)
    }

    /// Aggregation settings carried by these arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroStride`] when `n_windows_stride` is zero.
    pub fn aggregation(&self) -> Result<AggregationConfig, ConfigError> {
        AggregationConfig {
            n_windows_stride: self.n_windows_stride,
        }
        .validate()
    }
}

/// Errors raised by [`run`].
#[derive(Debug, Error)]
pub enum CliError {
    /// No logits file was configured.
    #[error("no logits file given; pass --logits or set DENSEP_LOGITS")]
    MissingLogits,
    /// The logits file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The logits file is not a nested JSON array of numbers.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Rows of the logits array differ in length.
    #[error("{} does not hold a rectangular (n_sequences, n_classes, n_windows) array", path.display())]
    Ragged { path: PathBuf },
    /// The arguments are out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Aggregation rejected the logits.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    /// The result could not be serialised.
    #[error("failed to render output: {0}")]
    Render(#[source] serde_json::Error),
}

/// Reads the configured logits, aggregates them and renders the result as
/// JSON: one row of class log-probabilities per dense timestep, or one class
/// index per timestep with `argmax`.
///
/// # Errors
///
/// Returns [`CliError`] when the file is missing, unreadable, malformed or
/// rejected by aggregation.
pub fn run(args: &DensepArgs) -> Result<String, CliError> {
    let config = args.aggregation()?;
    let path = args.logits.as_ref().ok_or(CliError::MissingLogits)?;
    let logits = read_logits(path)?;
    info!(
        path = %path.display(),
        shape = ?logits.shape(),
        n_windows_stride = config.n_windows_stride,
        "aggregating logits"
    );
    let dense = aggregate_probas(&logits, config.n_windows_stride)?;
    debug!(shape = ?dense.shape(), "aggregated");
    if args.argmax {
        serde_json::to_string(&argmax_rows(&dense)).map_err(CliError::Render)
    } else {
        let rows: Vec<Vec<f32>> = dense.outer_iter().map(|row| row.to_vec()).collect();
        serde_json::to_string(&rows).map_err(CliError::Render)
    }
}

fn read_logits(path: &Path) -> Result<Array3<f32>, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let nested: Vec<Vec<Vec<f32>>> =
        serde_json::from_str(&text).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let ragged = || CliError::Ragged {
        path: path.to_path_buf(),
    };
    let n_sequences = nested.len();
    let n_classes = nested.first().map_or(0, Vec::len);
    let n_windows = nested
        .first()
        .and_then(|sequence| sequence.first())
        .map_or(0, Vec::len);
    let rectangular = nested.iter().all(|sequence| {
        sequence.len() == n_classes && sequence.iter().all(|class| class.len() == n_windows)
    });
    if !rectangular {
        return Err(ragged());
    }
    let flat: Vec<f32> = nested.into_iter().flatten().flatten().collect();
    Array3::from_shape_vec((n_sequences, n_classes, n_windows), flat).map_err(|_| ragged())
}

fn argmax_rows(dense: &Array2<f32>) -> Vec<usize> {
    dense
        .lanes(Axis(1))
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (index, &value)| {
                    if value > best.1 { (index, value) } else { best }
                })
                .0
        })
        .collect()
}
