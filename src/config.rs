//! Run configuration.
//!
//! Defaults are compiled in. A `normalize.toml` in the working directory,
//! when present, overrides any subset of them:
//!
//! ```toml
//! input_path = "Input_Data/vmCloud_data.csv"
//! output_path = "Output_Data/normalizedvmCloud_data.csv"
//! scaler_path = "scaler.pkl"
//! ddof = "sample"        # or "population"
//! preview_rows = 5
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NormalizeError, Result};
use crate::scalers::Ddof;

pub const CONFIG_FILE: &str = "normalize.toml";

pub const DEFAULT_INPUT_PATH: &str = "Input_Data/vmCloud_data.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "Output_Data/normalizedvmCloud_data.csv";
pub const DEFAULT_SCALER_PATH: &str = "scaler.pkl";
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub scaler_path: PathBuf,
    pub ddof: Ddof,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            scaler_path: PathBuf::from(DEFAULT_SCALER_PATH),
            ddof: Ddof::default(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Config {
    /// Loads [`CONFIG_FILE`] from the working directory, or the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No {} found, using defaults", path.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| NormalizeError::io(path, e))?;
        let config = toml::from_str(&content).map_err(|source| NormalizeError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
