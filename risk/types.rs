use ndarray::{Array2, ArrayView1, ArrayView2};

/// A matrix whose columns carry names. Missing entries are `NaN`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: Array2<f64>,
}

/// Returned when the column names do not match the matrix width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub names: usize,
    pub columns: usize,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self, ShapeMismatch> {
        if columns.len() != values.ncols() {
            return Err(ShapeMismatch {
                names: columns.len(),
                columns: values.ncols(),
            });
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Rebuilds a frame with the same columns around a transformed matrix.
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.ncols(), self.columns.len());
        Self {
            columns: self.columns.clone(),
            values,
        }
    }
}
