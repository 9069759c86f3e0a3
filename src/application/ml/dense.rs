use crate::application::ml::adam::{Adam, MomentPair1, MomentPair2};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected linear layer, `y = W x + b`.
///
/// Deliberately carries no activation: the regression head of the
/// network is linear end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    w: Array2<f64>,
    b: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct DenseMoments {
    w: MomentPair2,
    b: MomentPair1,
}

impl DenseLayer {
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        let k = 1.0 / (input_dim as f64).sqrt();
        Self {
            w: Array2::from_shape_fn((output_dim, input_dim), |_| rng.random_range(-k..k)),
            b: Array1::zeros(output_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.w.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.w.nrows()
    }

    pub fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        self.w.dot(x) + &self.b
    }

    /// Given the input that produced the forward pass and the gradient
    /// on the output, returns parameter gradients and the gradient on
    /// the input.
    pub fn backward(&self, x: &Array1<f64>, dy: &Array1<f64>) -> (DenseGrads, Array1<f64>) {
        let dw = dy
            .view()
            .insert_axis(Axis(1))
            .dot(&x.view().insert_axis(Axis(0)));
        let dx = self.w.t().dot(dy);
        (
            DenseGrads {
                w: dw,
                b: dy.clone(),
            },
            dx,
        )
    }

    pub fn moments(&self) -> DenseMoments {
        DenseMoments {
            w: MomentPair2::zeros(self.w.nrows(), self.w.ncols()),
            b: MomentPair1::zeros(self.b.len()),
        }
    }

    pub fn apply_grads(&mut self, adam: &Adam, grads: &DenseGrads, moments: &mut DenseMoments) {
        adam.update2(&mut self.w, &grads.w, &mut moments.w);
        adam.update1(&mut self.b, &grads.b, &mut moments.b);
    }
}

/// Inverted dropout: at training time each component survives with
/// probability `1 - rate` and is scaled by `1 / (1 - rate)`, so the
/// expected activation is unchanged and inference needs no rescaling.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        debug_assert!((0.0..1.0).contains(&rate));
        Self { rate }
    }

    /// Samples a fresh mask; multiply activations and their gradients
    /// by the same mask.
    pub fn mask(&self, len: usize, rng: &mut StdRng) -> Array1<f64> {
        if self.rate == 0.0 {
            return Array1::ones(len);
        }
        let keep = 1.0 - self.rate;
        Array1::from_shape_fn(len, |_| {
            if rng.random::<f64>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_forward_is_affine() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = DenseLayer::new(2, 2, &mut rng);
        layer.w = array![[1.0, 2.0], [3.0, 4.0]];
        layer.b = array![0.5, -0.5];
        let y = layer.forward(&array![1.0, 1.0]);
        assert_eq!(y, array![3.5, 6.5]);
    }

    #[test]
    fn test_backward_gradients() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut layer = DenseLayer::new(2, 1, &mut rng);
        layer.w = array![[2.0, -1.0]];
        layer.b = array![0.0];
        let x = array![3.0, 4.0];
        let dy = array![1.5];
        let (grads, dx) = layer.backward(&x, &dy);
        assert_eq!(grads.w, array![[4.5, 6.0]]);
        assert_eq!(grads.b, array![1.5]);
        assert_eq!(dx, array![3.0, -1.5]);
    }

    #[test]
    fn test_dropout_mask_values_and_rate() {
        let mut rng = StdRng::seed_from_u64(9);
        let dropout = Dropout::new(0.2);
        let mask = dropout.mask(10_000, &mut rng);
        let keep_scale = 1.0 / 0.8;
        assert!(mask.iter().all(|&v| v == 0.0 || (v - keep_scale).abs() < 1e-12));
        let kept = mask.iter().filter(|&&v| v > 0.0).count() as f64 / 10_000.0;
        assert!((kept - 0.8).abs() < 0.02);
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let mut rng = StdRng::seed_from_u64(9);
        let mask = Dropout::new(0.0).mask(5, &mut rng);
        assert!(mask.iter().all(|&v| v == 1.0));
    }
}
