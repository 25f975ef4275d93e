use ndarray::ArrayD;

use super::Variable;

/// A gradient as produced by the host's differentiation engine.
#[derive(Debug, Clone)]
pub enum Gradient {
    Dense(ArrayD<f32>),
    Sparse(IndexedSlices),
}

impl Gradient {
    /// Returns the dense tensor, or `None` for a sparse gradient.
    pub fn as_dense(&self) -> Option<&ArrayD<f32>> {
        match self {
            Gradient::Dense(g) => Some(g),
            Gradient::Sparse(_) => None,
        }
    }
}

impl From<ArrayD<f32>> for Gradient {
    fn from(value: ArrayD<f32>) -> Self {
        Self::Dense(value)
    }
}

/// A row-sliced sparse gradient: `values[i]` is the gradient of row `indices[i]`
/// of a tensor shaped `dense_shape`.
#[derive(Debug, Clone)]
pub struct IndexedSlices {
    pub indices: Vec<usize>,
    pub values: ArrayD<f32>,
    pub dense_shape: Vec<usize>,
}

/// A `(gradient, variable)` pair, an absent gradient leaves the variable untouched.
pub type GradAndVar = (Option<Gradient>, Variable);

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;

    #[test]
    fn only_dense_gradients_expose_a_tensor() {
        let dense = Gradient::from(ArrayD::<f32>::ones(IxDyn(&[2])));
        assert_eq!(dense.as_dense(), Some(&ArrayD::ones(IxDyn(&[2]))));

        let sparse = Gradient::Sparse(IndexedSlices {
            indices: vec![0],
            values: ArrayD::ones(IxDyn(&[1, 2])),
            dense_shape: vec![3, 2],
        });
        assert!(sparse.as_dense().is_none());
    }
}
