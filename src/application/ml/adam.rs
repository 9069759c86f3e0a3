use ndarray::{Array1, Array2};

/// Adam optimizer.
///
/// Keeps first and second moment estimates per parameter tensor and
/// applies the bias-corrected update
///
/// ```text
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// p -= lr * (m / (1 - beta1^t)) / (sqrt(v / (1 - beta2^t)) + eps)
/// ```
///
/// The caller advances `t` once per optimization step via [`Adam::step`],
/// then updates each tensor of that step against its own moment state.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u64,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
        }
    }

    /// Advances the shared timestep. Call exactly once per gradient
    /// application round, before updating any tensor.
    pub fn step(&mut self) {
        self.t += 1;
    }

    pub fn timestep(&self) -> u64 {
        self.t
    }

    fn corrections(&self) -> (f64, f64) {
        debug_assert!(self.t > 0, "step() must run before updates");
        (
            1.0 - self.beta1.powi(self.t as i32),
            1.0 - self.beta2.powi(self.t as i32),
        )
    }

    pub fn update2(&self, param: &mut Array2<f64>, grad: &Array2<f64>, state: &mut MomentPair2) {
        let (bc1, bc2) = self.corrections();
        for (((p, g), m), v) in param
            .iter_mut()
            .zip(grad.iter())
            .zip(state.m.iter_mut())
            .zip(state.v.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }

    pub fn update1(&self, param: &mut Array1<f64>, grad: &Array1<f64>, state: &mut MomentPair1) {
        let (bc1, bc2) = self.corrections();
        for (((p, g), m), v) in param
            .iter_mut()
            .zip(grad.iter())
            .zip(state.m.iter_mut())
            .zip(state.v.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

/// Moment state for a matrix parameter.
#[derive(Debug, Clone)]
pub struct MomentPair2 {
    m: Array2<f64>,
    v: Array2<f64>,
}

impl MomentPair2 {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            m: Array2::zeros((rows, cols)),
            v: Array2::zeros((rows, cols)),
        }
    }
}

/// Moment state for a vector parameter.
#[derive(Debug, Clone)]
pub struct MomentPair1 {
    m: Array1<f64>,
    v: Array1<f64>,
}

impl MomentPair1 {
    pub fn zeros(len: usize) -> Self {
        Self {
            m: Array1::zeros(len),
            v: Array1::zeros(len),
        }
    }
}
