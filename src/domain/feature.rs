use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use chrono::NaiveDate;
use ndarray::Array2;
use tracing::warn;

/// The flattened projection of one snapshot: a date plus one optional
/// value per registry column. Absent source fields are `None`, never an
/// absent column.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Date-indexed feature history: one row per trading day, strictly
/// ascending, identical column set on every row. Still sparse; call
/// [`FeatureTable::resolve_missing`] before handing it to the scaler.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    columns: ColumnSet,
    dates: Vec<NaiveDate>,
    cells: Vec<Vec<Option<f64>>>,
}

impl FeatureTable {
    /// Assembles a table from parsed rows: sorts ascending by date and
    /// collapses duplicate dates (last one read wins, with a warning —
    /// snapshots are create-once, so a duplicate is an upstream anomaly
    /// worth surfacing but not aborting on).
    pub fn from_rows(
        columns: ColumnSet,
        mut rows: Vec<FeatureRow>,
    ) -> Result<Self, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyHistory);
        }
        rows.sort_by_key(|r| r.date);

        let mut dates: Vec<NaiveDate> = Vec::with_capacity(rows.len());
        let mut cells: Vec<Vec<Option<f64>>> = Vec::with_capacity(rows.len());
        for row in rows {
            debug_assert_eq!(row.values.len(), columns.len());
            if let Some(last) = cells.last_mut().filter(|_| dates.last() == Some(&row.date)) {
                warn!(date = %row.date, "duplicate snapshot date, keeping the later record");
                *last = row.values;
            } else {
                dates.push(row.date);
                cells.push(row.values);
            }
        }
        Ok(Self {
            columns,
            dates,
            cells,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells[row][col]
    }

    /// Resolves every missing cell and produces a dense matrix.
    ///
    /// Resolution order, column-wise: forward-fill from the most recent
    /// earlier value, then backward-fill any leading gap, then zero for
    /// columns with no value anywhere. Forward-fill runs first so real
    /// past data always wins over values leaking back from the future.
    pub fn resolve_missing(&self) -> DenseTable {
        let n_rows = self.dates.len();
        let n_cols = self.columns.len();
        let mut values = Array2::<f64>::zeros((n_rows, n_cols));

        for col in 0..n_cols {
            let mut filled: Vec<Option<f64>> = (0..n_rows).map(|r| self.cells[r][col]).collect();

            let mut last = None;
            for v in filled.iter_mut() {
                match *v {
                    Some(x) => last = Some(x),
                    None => *v = last,
                }
            }
            let mut next = None;
            for v in filled.iter_mut().rev() {
                match *v {
                    Some(x) => next = Some(x),
                    None => *v = next,
                }
            }
            if filled.iter().any(|v| v.is_none()) {
                warn!(
                    column = %self.columns.names()[col],
                    "column has no values anywhere in the history, defaulting to zero"
                );
            }
            for (row, v) in filled.into_iter().enumerate() {
                values[[row, col]] = v.unwrap_or(0.0);
            }
        }

        DenseTable {
            columns: self.columns.clone(),
            dates: self.dates.clone(),
            values,
        }
    }
}

/// Fully dense, chronologically ordered numeric history, ready for the
/// scaler and the windower.
#[derive(Debug, Clone)]
pub struct DenseTable {
    columns: ColumnSet,
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl DenseTable {
    pub fn new(columns: ColumnSet, dates: Vec<NaiveDate>, values: Array2<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.nrows());
        debug_assert_eq!(columns.len(), values.ncols());
        Self {
            columns,
            dates,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Appends an all-zero column; used when a configured target column
    /// is absent from an older persisted table.
    pub fn push_zero_column(&mut self, name: &str) {
        let n_rows = self.values.nrows();
        let mut widened = Array2::<f64>::zeros((n_rows, self.values.ncols() + 1));
        widened
            .slice_mut(ndarray::s![.., ..self.values.ncols()])
            .assign(&self.values);
        self.values = widened;
        self.columns.push(name);
    }
}
