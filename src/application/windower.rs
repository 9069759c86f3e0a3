use crate::domain::errors::PipelineError;
use ndarray::{s, Array2, ArrayView2};

/// Parallel (window, label) sequences cut from a scaled feature matrix.
#[derive(Debug, Clone)]
pub struct WindowSet {
    /// Each input is `timesteps` consecutive rows of the matrix.
    pub inputs: Vec<Array2<f64>>,
    /// Label i is row `i + timesteps`'s value at the target column.
    pub labels: Vec<f64>,
    pub timesteps: usize,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Cuts fixed-length windows out of an already scaled, chronologically
/// sorted, gap-free matrix. Purely positional: window i covers rows
/// `[i, i + timesteps)` and is labelled by row `i + timesteps`.
///
/// A matrix of N rows yields exactly `N - timesteps` windows; anything
/// shorter than `timesteps + 1` rows cannot produce a single labelled
/// window and is rejected.
pub fn build_windows(
    scaled: ArrayView2<f64>,
    target_col: usize,
    timesteps: usize,
) -> Result<WindowSet, PipelineError> {
    let n_rows = scaled.nrows();
    if n_rows < timesteps + 1 {
        return Err(PipelineError::InsufficientHistory {
            needed: timesteps + 1,
            got: n_rows,
        });
    }

    let n_windows = n_rows - timesteps;
    let mut inputs = Vec::with_capacity(n_windows);
    let mut labels = Vec::with_capacity(n_windows);
    for i in 0..n_windows {
        inputs.push(scaled.slice(s![i..i + timesteps, ..]).to_owned());
        labels.push(scaled[[i + timesteps, target_col]]);
    }

    Ok(WindowSet {
        inputs,
        labels,
        timesteps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Matrix where cell (r, c) = r * 10 + c, so indices are readable in
    /// the assertions.
    fn matrix(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * 10 + c) as f64)
    }

    #[test]
    fn test_window_count_is_rows_minus_timesteps() {
        let m = matrix(10, 4);
        let set = build_windows(m.view(), 0, 3).unwrap();
        assert_eq!(set.len(), 7);
        for w in &set.inputs {
            assert_eq!(w.nrows(), 3);
            assert_eq!(w.ncols(), 4);
        }
    }

    #[test]
    fn test_label_is_following_row_target_cell() {
        let m = matrix(6, 3);
        let set = build_windows(m.view(), 2, 3).unwrap();
        for (i, label) in set.labels.iter().enumerate() {
            assert_eq!(*label, ((i + 3) * 10 + 2) as f64);
        }
        // Window 0 starts at row 0.
        assert_eq!(set.inputs[0][[0, 0]], 0.0);
        assert_eq!(set.inputs[0][[2, 1]], 21.0);
    }

    #[test]
    fn test_minimum_viable_length() {
        let m = matrix(4, 2);
        let set = build_windows(m.view(), 0, 3).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_short_history_rejected() {
        let m = matrix(3, 2);
        let err = build_windows(m.view(), 0, 3).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory { needed: 4, got: 3 }
        ));
    }
}
