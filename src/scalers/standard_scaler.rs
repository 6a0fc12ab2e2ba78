use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NormalizeError, Result};
use crate::table::Table;

/// Which divisor the variance uses: `n` or `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ddof {
    Population,
    #[default]
    Sample,
}

impl Ddof {
    pub fn delta(self) -> u8 {
        match self {
            Ddof::Population => 0,
            Ddof::Sample => 1,
        }
    }
}

/// Fitted mean and standard deviation of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    pub std_dev: f64,
    pub n_samples: u64,
}

impl ColumnStats {
    pub fn new(column: &str, data: &[f64], ddof: Ddof) -> Result<Self> {
        let degenerate = |reason: String| NormalizeError::DegenerateColumn {
            column: column.to_owned(),
            reason,
        };

        let n = data.len();
        let delta = usize::from(ddof.delta());
        if n <= delta || n == 0 {
            return Err(degenerate(format!(
                "{n} value(s) is not enough for {ddof:?} standard deviation"
            )));
        }

        let mean = data.iter().sum::<f64>() / (n as f64);
        let var = data.iter().map(|&value| (value - mean).powi(2)).sum::<f64>() / ((n - delta) as f64);
        let std_dev = var.sqrt();

        if !mean.is_finite() || !std_dev.is_finite() {
            return Err(degenerate("statistics are not finite".to_owned()));
        }
        if std_dev == 0.0 {
            return Err(degenerate("zero variance".to_owned()));
        }

        Ok(ColumnStats {
            mean,
            std_dev,
            n_samples: n as u64,
        })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.std_dev + self.mean
    }
}

/// Everything needed to rebuild a fitted scaler. Columns are keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub ddof: u8,
    pub columns: BTreeMap<String, ColumnStats>,
}

/// Per-column z-score standardization over a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    params: ScalerParameters,
}

impl StandardScaler {
    /// Fits mean and standard deviation for each of `features`.
    ///
    /// Missing cells are ignored. Every feature must exist in the table and
    /// have a non-zero, finite standard deviation.
    pub fn fit(table: &Table, features: &[&str], ddof: Ddof) -> Result<Self> {
        if let Some(missing) = features.iter().find(|f| table.column_index(f).is_none()) {
            return Err(NormalizeError::MissingColumn((*missing).to_owned()));
        }

        let mut columns = BTreeMap::new();
        for &name in features {
            let data: Vec<f64> = table.numeric_column(name)?.into_iter().flatten().collect();
            let stats = ColumnStats::new(name, &data, ddof)?;
            log::debug!(
                "{name}: mean={} std_dev={} n={}",
                stats.mean,
                stats.std_dev,
                stats.n_samples
            );
            columns.insert(name.to_owned(), stats);
        }

        Ok(StandardScaler {
            params: ScalerParameters {
                ddof: ddof.delta(),
                columns,
            },
        })
    }

    pub fn fit_transform(table: &mut Table, features: &[&str], ddof: Ddof) -> Result<Self> {
        let scaler = Self::fit(table, features, ddof)?;
        scaler.transform(table)?;
        Ok(scaler)
    }

    pub fn from_params(params: ScalerParameters) -> Self {
        StandardScaler { params }
    }

    pub fn params(&self) -> &ScalerParameters {
        &self.params
    }

    pub fn stats(&self, column: &str) -> Option<&ColumnStats> {
        self.params.columns.get(column)
    }

    pub fn transform(&self, table: &mut Table) -> Result<()> {
        self.apply(table, ColumnStats::transform)
    }

    pub fn inverse_transform(&self, table: &mut Table) -> Result<()> {
        self.apply(table, ColumnStats::inverse)
    }

    pub fn transform_value(&self, column: &str, value: f64) -> Result<f64> {
        Ok(self.require(column)?.transform(value))
    }

    pub fn inverse_value(&self, column: &str, value: f64) -> Result<f64> {
        Ok(self.require(column)?.inverse(value))
    }

    fn require(&self, column: &str) -> Result<&ColumnStats> {
        self.stats(column)
            .ok_or_else(|| NormalizeError::MissingColumn(column.to_owned()))
    }

    fn apply(&self, table: &mut Table, f: fn(&ColumnStats, f64) -> f64) -> Result<()> {
        // Check every column up front so a failure never leaves a half-mapped table.
        if let Some(missing) = self
            .params
            .columns
            .keys()
            .find(|name| table.column_index(name).is_none())
        {
            return Err(NormalizeError::MissingColumn(missing.clone()));
        }
        for (name, stats) in &self.params.columns {
            table.map_numeric(name, |v| f(stats, v))?;
        }
        Ok(())
    }
}
