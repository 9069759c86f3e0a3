use crate::application::ml::adam::{Adam, MomentPair1, MomentPair2};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One GRU layer processing a sequence of input vectors.
///
/// Gate math per timestep:
///
/// ```text
/// z_t = sigmoid(W_z x_t + U_z h_{t-1} + b_z)      (update gate)
/// r_t = sigmoid(W_r x_t + U_r h_{t-1} + b_r)      (reset gate)
/// c_t = tanh(W_h x_t + U_h (r_t * h_{t-1}) + b_h) (candidate state)
/// h_t = (1 - z_t) * h_{t-1} + z_t * c_t
/// ```
///
/// `forward` records the full per-timestep trace so `backward` can run
/// exact backpropagation through time over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GruLayer {
    input_dim: usize,
    hidden_dim: usize,
    w_z: Array2<f64>,
    u_z: Array2<f64>,
    b_z: Array1<f64>,
    w_r: Array2<f64>,
    u_r: Array2<f64>,
    b_r: Array1<f64>,
    w_h: Array2<f64>,
    u_h: Array2<f64>,
    b_h: Array1<f64>,
}

/// Per-timestep activations kept for the backward pass.
#[derive(Debug, Clone)]
pub struct GruStep {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    z: Array1<f64>,
    r: Array1<f64>,
    c: Array1<f64>,
    h: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct GruTrace {
    steps: Vec<GruStep>,
}

impl GruTrace {
    /// Hidden state per timestep, in order.
    pub fn outputs(&self) -> Vec<&Array1<f64>> {
        self.steps.iter().map(|s| &s.h).collect()
    }

    pub fn last_output(&self) -> Option<&Array1<f64>> {
        self.steps.last().map(|s| &s.h)
    }
}

/// Parameter gradients mirroring [`GruLayer`]'s tensors.
#[derive(Debug, Clone)]
pub struct GruGrads {
    pub w_z: Array2<f64>,
    pub u_z: Array2<f64>,
    pub b_z: Array1<f64>,
    pub w_r: Array2<f64>,
    pub u_r: Array2<f64>,
    pub b_r: Array1<f64>,
    pub w_h: Array2<f64>,
    pub u_h: Array2<f64>,
    pub b_h: Array1<f64>,
}

/// Adam moment state for every tensor of one layer.
#[derive(Debug, Clone)]
pub struct GruMoments {
    w_z: MomentPair2,
    u_z: MomentPair2,
    b_z: MomentPair1,
    w_r: MomentPair2,
    u_r: MomentPair2,
    b_r: MomentPair1,
    w_h: MomentPair2,
    u_h: MomentPair2,
    b_h: MomentPair1,
}

impl GruLayer {
    /// Uniform(-k, k) initialization with k = 1/sqrt(hidden_dim).
    pub fn new(input_dim: usize, hidden_dim: usize, rng: &mut StdRng) -> Self {
        let k = 1.0 / (hidden_dim as f64).sqrt();
        let mut mat = |rows: usize, cols: usize| {
            Array2::from_shape_fn((rows, cols), |_| rng.random_range(-k..k))
        };
        let w_z = mat(hidden_dim, input_dim);
        let u_z = mat(hidden_dim, hidden_dim);
        let w_r = mat(hidden_dim, input_dim);
        let u_r = mat(hidden_dim, hidden_dim);
        let w_h = mat(hidden_dim, input_dim);
        let u_h = mat(hidden_dim, hidden_dim);
        Self {
            input_dim,
            hidden_dim,
            w_z,
            u_z,
            b_z: Array1::zeros(hidden_dim),
            w_r,
            u_r,
            b_r: Array1::zeros(hidden_dim),
            w_h,
            u_h,
            b_h: Array1::zeros(hidden_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn forward(&self, xs: &[Array1<f64>]) -> GruTrace {
        let mut h = Array1::<f64>::zeros(self.hidden_dim);
        let mut steps = Vec::with_capacity(xs.len());
        for x in xs {
            let z = sigmoid(&(self.w_z.dot(x) + self.u_z.dot(&h) + &self.b_z));
            let r = sigmoid(&(self.w_r.dot(x) + self.u_r.dot(&h) + &self.b_r));
            let rh = &r * &h;
            let c = (self.w_h.dot(x) + self.u_h.dot(&rh) + &self.b_h).mapv(f64::tanh);
            let one_minus_z = z.mapv(|v| 1.0 - v);
            let h_next = &one_minus_z * &h + &z * &c;
            steps.push(GruStep {
                x: x.clone(),
                h_prev: h,
                z,
                r,
                c,
                h: h_next.clone(),
            });
            h = h_next;
        }
        GruTrace { steps }
    }

    /// Backpropagation through time.
    ///
    /// `dh_out[t]` is the loss gradient arriving at the layer's output
    /// for timestep t from whatever consumes it (zeros everywhere but
    /// the last step when only the final state is used). Returns the
    /// parameter gradients and the gradient flowing into each input.
    pub fn backward(
        &self,
        trace: &GruTrace,
        dh_out: &[Array1<f64>],
    ) -> (GruGrads, Vec<Array1<f64>>) {
        debug_assert_eq!(trace.steps.len(), dh_out.len());
        let mut grads = self.zero_grads();
        let mut dxs = vec![Array1::<f64>::zeros(self.input_dim); trace.steps.len()];
        let mut dh_carry = Array1::<f64>::zeros(self.hidden_dim);

        for t in (0..trace.steps.len()).rev() {
            let s = &trace.steps[t];
            let dh = &dh_out[t] + &dh_carry;

            let dc = &dh * &s.z;
            let dz = &dh * &(&s.c - &s.h_prev);
            let mut dh_prev = &dh * &s.z.mapv(|v| 1.0 - v);

            // Candidate branch: c = tanh(a_c), a_c = W_h x + U_h (r*h_prev) + b_h
            let da_c = &dc * &s.c.mapv(|v| 1.0 - v * v);
            grads.w_h += &outer(&da_c, &s.x);
            grads.u_h += &outer(&da_c, &(&s.r * &s.h_prev));
            grads.b_h += &da_c;
            let through_uh = self.u_h.t().dot(&da_c);
            let dr = &through_uh * &s.h_prev;
            dh_prev += &(&through_uh * &s.r);

            // Update gate.
            let da_z = &dz * &(&s.z * &s.z.mapv(|v| 1.0 - v));
            grads.w_z += &outer(&da_z, &s.x);
            grads.u_z += &outer(&da_z, &s.h_prev);
            grads.b_z += &da_z;
            dh_prev += &self.u_z.t().dot(&da_z);

            // Reset gate.
            let da_r = &dr * &(&s.r * &s.r.mapv(|v| 1.0 - v));
            grads.w_r += &outer(&da_r, &s.x);
            grads.u_r += &outer(&da_r, &s.h_prev);
            grads.b_r += &da_r;
            dh_prev += &self.u_r.t().dot(&da_r);

            dxs[t] = self.w_z.t().dot(&da_z) + self.w_r.t().dot(&da_r) + self.w_h.t().dot(&da_c);
            dh_carry = dh_prev;
        }

        (grads, dxs)
    }

    fn zero_grads(&self) -> GruGrads {
        GruGrads {
            w_z: Array2::zeros((self.hidden_dim, self.input_dim)),
            u_z: Array2::zeros((self.hidden_dim, self.hidden_dim)),
            b_z: Array1::zeros(self.hidden_dim),
            w_r: Array2::zeros((self.hidden_dim, self.input_dim)),
            u_r: Array2::zeros((self.hidden_dim, self.hidden_dim)),
            b_r: Array1::zeros(self.hidden_dim),
            w_h: Array2::zeros((self.hidden_dim, self.input_dim)),
            u_h: Array2::zeros((self.hidden_dim, self.hidden_dim)),
            b_h: Array1::zeros(self.hidden_dim),
        }
    }

    pub fn moments(&self) -> GruMoments {
        GruMoments {
            w_z: MomentPair2::zeros(self.hidden_dim, self.input_dim),
            u_z: MomentPair2::zeros(self.hidden_dim, self.hidden_dim),
            b_z: MomentPair1::zeros(self.hidden_dim),
            w_r: MomentPair2::zeros(self.hidden_dim, self.input_dim),
            u_r: MomentPair2::zeros(self.hidden_dim, self.hidden_dim),
            b_r: MomentPair1::zeros(self.hidden_dim),
            w_h: MomentPair2::zeros(self.hidden_dim, self.input_dim),
            u_h: MomentPair2::zeros(self.hidden_dim, self.hidden_dim),
            b_h: MomentPair1::zeros(self.hidden_dim),
        }
    }

    pub fn apply_grads(&mut self, adam: &Adam, grads: &GruGrads, moments: &mut GruMoments) {
        adam.update2(&mut self.w_z, &grads.w_z, &mut moments.w_z);
        adam.update2(&mut self.u_z, &grads.u_z, &mut moments.u_z);
        adam.update1(&mut self.b_z, &grads.b_z, &mut moments.b_z);
        adam.update2(&mut self.w_r, &grads.w_r, &mut moments.w_r);
        adam.update2(&mut self.u_r, &grads.u_r, &mut moments.u_r);
        adam.update1(&mut self.b_r, &grads.b_r, &mut moments.b_r);
        adam.update2(&mut self.w_h, &grads.w_h, &mut moments.w_h);
        adam.update2(&mut self.u_h, &grads.u_h, &mut moments.u_h);
        adam.update1(&mut self.b_h, &grads.b_h, &mut moments.b_h);
    }
}

fn sigmoid(a: &Array1<f64>) -> Array1<f64> {
    a.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let col = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    col.dot(&row)
}
