//! Load, standardize and write: the whole run.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::persist;
use crate::scalers::StandardScaler;
use crate::table::Table;

/// Numeric columns standardized by every run.
pub const FEATURES: [&str; 7] = [
    "cpu_usage",
    "memory_usage",
    "network_traffic",
    "power_consumption",
    "num_executed_instructions",
    "execution_time",
    "energy_efficiency",
];

#[derive(Debug)]
pub struct RunOutput {
    pub table: Table,
    pub scaler: StandardScaler,
    pub output_path: PathBuf,
    pub scaler_path: PathBuf,
}

/// Runs the pipeline described by `config`.
///
/// Both outputs are staged first and committed together: if either rename
/// fails, the other is undone and any file it replaced is put back.
pub fn run(config: &Config) -> Result<RunOutput> {
    let mut table = Table::read_csv(&config.input_path, &FEATURES)?;

    let scaler = StandardScaler::fit_transform(&mut table, &FEATURES, config.ddof)?;
    log::info!(
        "Standardized {} columns over {} rows (ddof={})",
        FEATURES.len(),
        table.len(),
        config.ddof.delta()
    );

    let mut staged_scaler = persist::stage(&config.scaler_path)?;
    persist::write_params(scaler.params(), &mut staged_scaler)?;

    let mut staged_table = persist::stage(&config.output_path)?;
    table
        .write_to(&mut staged_table)
        .map_err(|e| e.at_path(&config.output_path))?;

    persist::commit_all(vec![
        (staged_table, config.output_path.as_path()),
        (staged_scaler, config.scaler_path.as_path()),
    ])?;
    log::info!("Wrote {} rows to {}", table.len(), config.output_path.display());
    log::info!("Saved scaler parameters to {}", config.scaler_path.display());

    Ok(RunOutput {
        table,
        scaler,
        output_path: config.output_path.clone(),
        scaler_path: config.scaler_path.clone(),
    })
}
