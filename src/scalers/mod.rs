mod standard_scaler;

pub use standard_scaler::{ColumnStats, Ddof, ScalerParameters, StandardScaler};
