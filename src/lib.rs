//! Standardizes the resource-usage columns of a VM cloud dataset and keeps
//! the fitted scaler so the same transform can be replayed later.

pub mod config;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod scalers;
pub mod table;

pub use config::Config;
pub use error::{NormalizeError, Result};
pub use pipeline::{run, RunOutput, FEATURES};
pub use scalers::{ColumnStats, Ddof, ScalerParameters, StandardScaler};
pub use table::{Cell, Table};
