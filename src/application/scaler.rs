use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::feature::DenseTable;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Per-column min-max scaling transform.
///
/// Fitted once per training invocation over the full feature table and
/// persisted with the ordered column list so a model can only ever be
/// applied through the exact statistics that encoded its training data.
/// A constant column maps to the range minimum both ways (divisor
/// clamped to 1), keeping the transform invertible everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    range: (f64, f64),
    data_min: Vec<f64>,
    data_max: Vec<f64>,
    columns: ColumnSet,
}

impl MinMaxScaler {
    /// Fits statistics over every column of the table.
    pub fn fit(table: &DenseTable, range: (f64, f64)) -> Self {
        let values = table.values();
        let n_cols = values.ncols();
        let mut data_min = vec![f64::INFINITY; n_cols];
        let mut data_max = vec![f64::NEG_INFINITY; n_cols];
        for row in values.rows() {
            for (c, v) in row.iter().enumerate() {
                data_min[c] = data_min[c].min(*v);
                data_max[c] = data_max[c].max(*v);
            }
        }
        // Zero-row tables never reach this point, but keep the
        // statistics sane rather than infinite if one ever does.
        for c in 0..n_cols {
            if !data_min[c].is_finite() {
                data_min[c] = 0.0;
                data_max[c] = 0.0;
            }
        }
        Self {
            range,
            data_min,
            data_max,
            columns: table.columns().clone(),
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.data_min.len()
    }

    fn scale(&self, col: usize) -> f64 {
        let spread = self.data_max[col] - self.data_min[col];
        let divisor = if spread == 0.0 { 1.0 } else { spread };
        (self.range.1 - self.range.0) / divisor
    }

    /// Scales a matrix whose columns match the fitted column set.
    pub fn transform(&self, values: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if values.ncols() != self.n_columns() {
            return Err(PipelineError::ColumnMismatch {
                expected: self.n_columns(),
                got: values.ncols(),
            });
        }
        let mut scaled = values.to_owned();
        for mut row in scaled.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.range.0 + (*v - self.data_min[c]) * self.scale(c);
            }
        }
        Ok(scaled)
    }

    /// Inverse transform of the whole matrix.
    pub fn inverse_transform(
        &self,
        scaled: ArrayView2<f64>,
    ) -> Result<Array2<f64>, PipelineError> {
        if scaled.ncols() != self.n_columns() {
            return Err(PipelineError::ColumnMismatch {
                expected: self.n_columns(),
                got: scaled.ncols(),
            });
        }
        let mut values = scaled.to_owned();
        for mut row in values.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.data_min[c] + (*v - self.range.0) / self.scale(c);
            }
        }
        Ok(values)
    }

    /// Maps a single scaled value in one column back to its native
    /// scale; this is how a scalar model output becomes a percentage.
    pub fn inverse_value(&self, col: usize, scaled: f64) -> f64 {
        self.data_min[col] + (scaled - self.range.0) / self.scale(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn dense(values: Array2<f64>) -> DenseTable {
        let columns = ColumnSet::new(&[], &["A".into(), "B".into(), "C".into()], "1.0");
        let dates = (1..=values.nrows() as u32)
            .map(|d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap())
            .collect();
        DenseTable::new(columns, dates, values)
    }

    #[test]
    fn test_scaled_range() {
        let table = dense(array![[0.0, 10.0, 5.0], [10.0, 20.0, 5.0], [5.0, 15.0, 5.0]]);
        let scaler = MinMaxScaler::fit(&table, (0.0, 1.0));
        let scaled = scaler.transform(table.values().view()).unwrap();
        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 1.0);
        assert_eq!(scaled[[2, 0]], 0.5);
        // Constant column collapses to the range minimum.
        assert_eq!(scaled[[0, 2]], 0.0);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let table = dense(array![
            [0.1, -4.0, 3.3],
            [0.2, 8.5, 3.3],
            [-0.1, 2.25, 3.3],
            [0.3, -7.75, 3.3]
        ]);
        let scaler = MinMaxScaler::fit(&table, (0.0, 1.0));
        let scaled = scaler.transform(table.values().view()).unwrap();
        let restored = scaler.inverse_transform(scaled.view()).unwrap();
        for (orig, back) in table.values().iter().zip(restored.iter()) {
            assert!((orig - back).abs() < 1e-9, "{orig} != {back}");
        }
    }

    #[test]
    fn test_inverse_value_matches_matrix_inverse() {
        let table = dense(array![[1.0, 2.0, 3.0], [5.0, 6.0, 7.0]]);
        let scaler = MinMaxScaler::fit(&table, (0.0, 1.0));
        let scaled = scaler.transform(table.values().view()).unwrap();
        assert!((scaler.inverse_value(1, scaled[[1, 1]]) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_range() {
        let table = dense(array![[0.0, 0.0, 0.0], [2.0, 4.0, 8.0]]);
        let scaler = MinMaxScaler::fit(&table, (-1.0, 1.0));
        let scaled = scaler.transform(table.values().view()).unwrap();
        assert_eq!(scaled[[0, 0]], -1.0);
        assert_eq!(scaled[[1, 0]], 1.0);
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let table = dense(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let scaler = MinMaxScaler::fit(&table, (0.0, 1.0));
        let narrow = array![[1.0, 2.0]];
        assert!(matches!(
            scaler.transform(narrow.view()).unwrap_err(),
            PipelineError::ColumnMismatch { expected: 3, got: 2 }
        ));
    }
}
