//! Score tensors and the probability normalizer.

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayViewD, Axis, IxDyn, ShapeError};

/// Raw classifier output for one input. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTensor {
    data: ArrayD<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl ScoreTensor {
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    pub fn from_shape_vec(shape: &[usize], values: Vec<f32>) -> Result<Self, ShapeError> {
        Ok(Self {
            data: ArrayD::from_shape_vec(IxDyn(shape), values)?,
        })
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// A tensor holds logits as soon as any element anywhere is negative.
    pub fn is_logits(&self) -> bool {
        self.data.iter().any(|&v| v < 0.0)
    }

    pub fn stats(&self) -> Option<TensorStats> {
        if self.data.is_empty() {
            return None;
        }
        let (min, max, sum) = self.data.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + f64::from(v)),
        );
        Some(TensorStats {
            min,
            max,
            mean: (sum / self.data.len() as f64) as f32,
        })
    }

    /// Elements in logical (row-major) order regardless of memory layout.
    pub fn flattened(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Reinterprets the whole tensor as a `(rows, cols)` matrix.
    pub(crate) fn as_matrix(&self, rows: usize, cols: usize) -> Result<Array2<f32>, ShapeError> {
        Array2::from_shape_vec((rows, cols), self.flattened())
    }

    /// Picks `index` along `axis` and returns the remaining 2-d slab.
    pub(crate) fn slab(&self, axis: usize, index: usize) -> Result<Array2<f32>, ShapeError> {
        self.data
            .index_axis(Axis(axis), index)
            .to_owned()
            .into_dimensionality::<ndarray::Ix2>()
    }
}

impl From<ArrayD<f32>> for ScoreTensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

/// Softmax when `logits` is set, identity otherwise.
///
/// The flag is decided once per decode from the whole tensor, see
/// [`ScoreTensor::is_logits`].
pub fn normalize_row(row: ArrayView1<f32>, logits: bool) -> Array1<f32> {
    if !logits {
        return row.to_owned();
    }
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut exp = row.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    if sum > 0.0 && sum.is_finite() {
        exp.mapv_inplace(|v| v / sum);
    }
    exp
}

pub fn normalize_rows(rows: &Array2<f32>, logits: bool) -> Array2<f32> {
    let mut out = rows.clone();
    if !logits {
        return out;
    }
    for mut row in out.rows_mut() {
        let normalized = normalize_row(row.view(), true);
        row.assign(&normalized);
    }
    out
}

/// Index of the largest value; the first one wins ties and NaN is ignored.
pub fn argmax(row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (idx, &value) in row.iter().enumerate() {
        if value > best_value {
            best = idx;
            best_value = value;
        }
    }
    best
}

/// Top-1 and top-2 indices of a row.
pub fn top_two(row: ArrayView1<f32>) -> (usize, Option<usize>) {
    let first = argmax(row);
    let mut second: Option<(usize, f32)> = None;
    for (idx, &value) in row.iter().enumerate() {
        if idx == first || value.is_nan() {
            continue;
        }
        match second {
            Some((_, best)) if value <= best => {}
            _ => second = Some((idx, value)),
        }
    }
    (first, second.map(|(idx, _)| idx))
}

pub fn top_k(row: ArrayView1<f32>, k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}

pub fn argmax_rows(rows: &Array2<f32>) -> Vec<usize> {
    rows.rows().into_iter().map(argmax).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn softmax_sums_to_one() {
        let row = array![-1.0f32, 2.0, 0.5];
        let probs = normalize_row(row.view(), true);
        assert!((probs.sum() - 1.0).abs() < 1e-5);
        assert_eq!(argmax(probs.view()), 1);
    }

    #[test]
    fn softmax_is_stable_for_large_values() {
        let row = array![1000.0f32, 999.0, -1000.0];
        let probs = normalize_row(row.view(), true);
        assert!(probs.iter().all(|v| v.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn probabilities_pass_through() {
        let row = array![0.2f32, 0.7, 0.1];
        let out = normalize_row(row.view(), false);
        assert_eq!(out, row);
    }

    #[test]
    fn logits_decided_tensor_wide() {
        let tensor = ScoreTensor::from_shape_vec(&[2, 2], vec![0.1, 0.9, 0.5, -0.01]).unwrap();
        assert!(tensor.is_logits());
        let tensor = ScoreTensor::from_shape_vec(&[2, 2], vec![0.1, 0.9, 0.5, 0.5]).unwrap();
        assert!(!tensor.is_logits());
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        let row = array![0.5f32, 0.5, 0.1];
        assert_eq!(argmax(row.view()), 0);
    }

    #[test]
    fn top_two_orders_by_value() {
        let row = array![0.1f32, 0.6, 0.3];
        assert_eq!(top_two(row.view()), (1, Some(2)));
        let single = array![1.0f32];
        assert_eq!(top_two(single.view()), (0, None));
    }

    #[test]
    fn stats_report_range() {
        let tensor = ScoreTensor::from_shape_vec(&[1, 4], vec![-2.0, 0.0, 1.0, 5.0]).unwrap();
        let stats = tensor.stats().unwrap();
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.mean - 1.0).abs() < f32::EPSILON);
    }
}
