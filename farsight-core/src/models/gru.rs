//! Gated recurrent unit with a linear readout head.
//!
//! Single-layer GRU consuming a fixed-length window of feature rows and
//! emitting one scalar from the final hidden state. Trained by full
//! backpropagation through time with the loss applied at the last step only.
//!
//! Cell equations:
//!   z = sigmoid(Wiz x + Whz h + bz)        (update gate)
//!   r = sigmoid(Wir x + Whr h + br)        (reset gate)
//!   n = tanh(Win x + Whn (r ⊙ h) + bn)     (candidate state)
//!   h' = (1 - z) ⊙ n + z ⊙ h

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Single GRU cell.
#[derive(Debug, Clone)]
struct GruCell {
    w_iz: Array2<f64>,
    w_hz: Array2<f64>,
    b_z: Array1<f64>,
    w_ir: Array2<f64>,
    w_hr: Array2<f64>,
    b_r: Array1<f64>,
    w_in: Array2<f64>,
    w_hn: Array2<f64>,
    b_n: Array1<f64>,
}

/// Per-step activations cached during the forward pass for BPTT.
struct StepCache {
    h_prev: Array1<f64>,
    z: Array1<f64>,
    r: Array1<f64>,
    n: Array1<f64>,
}

/// GRU network: one cell plus a linear head reading the final hidden state.
#[derive(Debug, Clone)]
pub struct Gru {
    input_size: usize,
    hidden_size: usize,
    cell: GruCell,
    w_out: Array1<f64>,
    b_out: f64,
}

/// Accumulated parameter gradients for one backward pass.
pub struct GruGrads {
    w_iz: Array2<f64>,
    w_hz: Array2<f64>,
    b_z: Array1<f64>,
    w_ir: Array2<f64>,
    w_hr: Array2<f64>,
    b_r: Array1<f64>,
    w_in: Array2<f64>,
    w_hn: Array2<f64>,
    b_n: Array1<f64>,
    w_out: Array1<f64>,
    b_out: f64,
}

/// Serializable weight snapshot for model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GruWeights {
    pub input_size: usize,
    pub hidden_size: usize,
    pub w_iz: Vec<f64>,
    pub w_hz: Vec<f64>,
    pub b_z: Vec<f64>,
    pub w_ir: Vec<f64>,
    pub w_hr: Vec<f64>,
    pub b_r: Vec<f64>,
    pub w_in: Vec<f64>,
    pub w_hn: Vec<f64>,
    pub b_n: Vec<f64>,
    pub w_out: Vec<f64>,
    pub b_out: f64,
}

fn sigmoid(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

fn outer(a: &Array1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

impl GruCell {
    fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        Self {
            w_iz: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hz: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_z: Array1::zeros(hidden_size),
            w_ir: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hr: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_r: Array1::zeros(hidden_size),
            w_in: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hn: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_n: Array1::zeros(hidden_size),
        }
    }

    /// One time step. Returns the new hidden state and the activation cache.
    fn forward(&self, x: ArrayView1<f64>, h_prev: &Array1<f64>) -> (Array1<f64>, StepCache) {
        let z = sigmoid(&(self.w_iz.dot(&x) + self.w_hz.dot(h_prev) + &self.b_z));
        let r = sigmoid(&(self.w_ir.dot(&x) + self.w_hr.dot(h_prev) + &self.b_r));
        let gated = &r * h_prev;
        let n = (self.w_in.dot(&x) + self.w_hn.dot(&gated) + &self.b_n).mapv(f64::tanh);
        let one_minus_z = z.mapv(|v| 1.0 - v);
        let h = &one_minus_z * &n + &z * h_prev;
        (
            h,
            StepCache {
                h_prev: h_prev.clone(),
                z,
                r,
                n,
            },
        )
    }
}

impl Gru {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        Self {
            input_size,
            hidden_size,
            cell: GruCell::new(input_size, hidden_size, rng),
            w_out: Array1::random_using(hidden_size, dist, rng),
            b_out: 0.0,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run the sequence (rows = time steps) and read out a scalar.
    pub fn forward(&self, seq: ArrayView2<f64>) -> f64 {
        let mut h = Array1::zeros(self.hidden_size);
        for x in seq.rows() {
            let (h_next, _) = self.cell.forward(x, &h);
            h = h_next;
        }
        self.w_out.dot(&h) + self.b_out
    }

    /// Forward pass keeping per-step activations for BPTT.
    fn forward_cached(&self, seq: ArrayView2<f64>) -> (f64, Array1<f64>, Vec<StepCache>) {
        let mut h = Array1::zeros(self.hidden_size);
        let mut caches = Vec::with_capacity(seq.nrows());
        for x in seq.rows() {
            let (h_next, cache) = self.cell.forward(x, &h);
            caches.push(cache);
            h = h_next;
        }
        let y = self.w_out.dot(&h) + self.b_out;
        (y, h, caches)
    }

    /// One SGD step on a single (sequence, target) pair with squared error
    /// loss. Returns the pre-update squared error.
    pub fn train_step(
        &mut self,
        seq: ArrayView2<f64>,
        target: f64,
        learning_rate: f64,
        grad_clip: f64,
    ) -> f64 {
        let (y, h_final, caches) = self.forward_cached(seq);
        let err = y - target;
        let dy = 2.0 * err;

        let mut grads = self.backward(seq, &h_final, &caches, dy);
        grads.clip_global_norm(grad_clip);
        self.apply(&grads, learning_rate);

        err * err
    }

    /// Backpropagation through time; loss gradient `dy` applies to the
    /// readout of the final step.
    fn backward(
        &self,
        seq: ArrayView2<f64>,
        h_final: &Array1<f64>,
        caches: &[StepCache],
        dy: f64,
    ) -> GruGrads {
        let mut g = GruGrads::zeros(self.input_size, self.hidden_size);

        g.w_out = h_final.mapv(|v| v * dy);
        g.b_out = dy;

        // Gradient w.r.t. the hidden state flowing backwards
        let mut dh = self.w_out.mapv(|v| v * dy);

        for (t, cache) in caches.iter().enumerate().rev() {
            let x = seq.row(t);
            let StepCache { h_prev, z, r, n } = cache;

            // h = (1 - z) ⊙ n + z ⊙ h_prev
            let dz = &dh * &(h_prev - n);
            let dn = &dh * &z.mapv(|v| 1.0 - v);
            let mut dh_prev = &dh * z;

            // n = tanh(pre_n)
            let dn_pre = &dn * &n.mapv(|v| 1.0 - v * v);
            let gated = r * h_prev;
            g.w_in += &outer(&dn_pre, x);
            g.w_hn += &outer(&dn_pre, gated.view());
            g.b_n += &dn_pre;

            let d_gated = self.cell.w_hn.t().dot(&dn_pre);
            let dr = &d_gated * h_prev;
            dh_prev += &(&d_gated * r);

            // Sigmoid gate derivatives
            let dz_pre = &dz * &(z * &z.mapv(|v| 1.0 - v));
            let dr_pre = &dr * &(r * &r.mapv(|v| 1.0 - v));

            g.w_iz += &outer(&dz_pre, x);
            g.w_hz += &outer(&dz_pre, h_prev.view());
            g.b_z += &dz_pre;
            g.w_ir += &outer(&dr_pre, x);
            g.w_hr += &outer(&dr_pre, h_prev.view());
            g.b_r += &dr_pre;

            dh_prev += &self.cell.w_hz.t().dot(&dz_pre);
            dh_prev += &self.cell.w_hr.t().dot(&dr_pre);

            dh = dh_prev;
        }

        g
    }

    fn apply(&mut self, g: &GruGrads, lr: f64) {
        self.cell.w_iz.scaled_add(-lr, &g.w_iz);
        self.cell.w_hz.scaled_add(-lr, &g.w_hz);
        self.cell.b_z.scaled_add(-lr, &g.b_z);
        self.cell.w_ir.scaled_add(-lr, &g.w_ir);
        self.cell.w_hr.scaled_add(-lr, &g.w_hr);
        self.cell.b_r.scaled_add(-lr, &g.b_r);
        self.cell.w_in.scaled_add(-lr, &g.w_in);
        self.cell.w_hn.scaled_add(-lr, &g.w_hn);
        self.cell.b_n.scaled_add(-lr, &g.b_n);
        self.w_out.scaled_add(-lr, &g.w_out);
        self.b_out -= lr * g.b_out;
    }

    /// Snapshot weights for artifact persistence.
    pub fn to_weights(&self) -> GruWeights {
        let flat2 = |a: &Array2<f64>| a.iter().copied().collect::<Vec<f64>>();
        let flat1 = |a: &Array1<f64>| a.to_vec();
        GruWeights {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            w_iz: flat2(&self.cell.w_iz),
            w_hz: flat2(&self.cell.w_hz),
            b_z: flat1(&self.cell.b_z),
            w_ir: flat2(&self.cell.w_ir),
            w_hr: flat2(&self.cell.w_hr),
            b_r: flat1(&self.cell.b_r),
            w_in: flat2(&self.cell.w_in),
            w_hn: flat2(&self.cell.w_hn),
            b_n: flat1(&self.cell.b_n),
            w_out: flat1(&self.w_out),
            b_out: self.b_out,
        }
    }

    /// Rebuild a network from an artifact snapshot.
    ///
    /// Returns None when the stored dimensions are inconsistent.
    pub fn from_weights(w: &GruWeights) -> Option<Self> {
        let (i, h) = (w.input_size, w.hidden_size);
        let shape2 = |v: &[f64], rows: usize, cols: usize| {
            Array2::from_shape_vec((rows, cols), v.to_vec()).ok()
        };
        let shape1 = |v: &[f64], len: usize| {
            if v.len() == len {
                Some(Array1::from(v.to_vec()))
            } else {
                None
            }
        };

        Some(Self {
            input_size: i,
            hidden_size: h,
            cell: GruCell {
                w_iz: shape2(&w.w_iz, h, i)?,
                w_hz: shape2(&w.w_hz, h, h)?,
                b_z: shape1(&w.b_z, h)?,
                w_ir: shape2(&w.w_ir, h, i)?,
                w_hr: shape2(&w.w_hr, h, h)?,
                b_r: shape1(&w.b_r, h)?,
                w_in: shape2(&w.w_in, h, i)?,
                w_hn: shape2(&w.w_hn, h, h)?,
                b_n: shape1(&w.b_n, h)?,
            },
            w_out: shape1(&w.w_out, h)?,
            b_out: w.b_out,
        })
    }
}

impl GruGrads {
    fn zeros(input_size: usize, hidden_size: usize) -> Self {
        Self {
            w_iz: Array2::zeros((hidden_size, input_size)),
            w_hz: Array2::zeros((hidden_size, hidden_size)),
            b_z: Array1::zeros(hidden_size),
            w_ir: Array2::zeros((hidden_size, input_size)),
            w_hr: Array2::zeros((hidden_size, hidden_size)),
            b_r: Array1::zeros(hidden_size),
            w_in: Array2::zeros((hidden_size, input_size)),
            w_hn: Array2::zeros((hidden_size, hidden_size)),
            b_n: Array1::zeros(hidden_size),
            w_out: Array1::zeros(hidden_size),
            b_out: 0.0,
        }
    }

    /// Rescale all gradients so the global L2 norm is at most `max_norm`.
    fn clip_global_norm(&mut self, max_norm: f64) {
        let sq = |a: &Array2<f64>| a.iter().map(|v| v * v).sum::<f64>();
        let sq1 = |a: &Array1<f64>| a.iter().map(|v| v * v).sum::<f64>();
        let total = sq(&self.w_iz)
            + sq(&self.w_hz)
            + sq1(&self.b_z)
            + sq(&self.w_ir)
            + sq(&self.w_hr)
            + sq1(&self.b_r)
            + sq(&self.w_in)
            + sq(&self.w_hn)
            + sq1(&self.b_n)
            + sq1(&self.w_out)
            + self.b_out * self.b_out;
        let norm = total.sqrt();
        if norm > max_norm && norm > 0.0 {
            let scale = max_norm / norm;
            self.w_iz *= scale;
            self.w_hz *= scale;
            self.b_z *= scale;
            self.w_ir *= scale;
            self.w_hr *= scale;
            self.b_r *= scale;
            self.w_in *= scale;
            self.w_hn *= scale;
            self.b_n *= scale;
            self.w_out *= scale;
            self.b_out *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn forward_is_deterministic_for_same_seed() {
        let seq = Array2::from_shape_fn((10, 4), |(i, j)| (i as f64 * 0.1 + j as f64).sin());
        let a = Gru::new(4, 8, &mut rng()).forward(seq.view());
        let b = Gru::new(4, 8, &mut rng()).forward(seq.view());
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_finite() {
        let gru = Gru::new(3, 6, &mut rng());
        let seq = Array2::from_elem((20, 3), 0.5);
        assert!(gru.forward(seq.view()).is_finite());
    }

    #[test]
    fn training_reduces_loss_on_constant_target() {
        let mut gru = Gru::new(2, 8, &mut rng());
        let seq = Array2::from_shape_fn((6, 2), |(i, j)| (i + j) as f64 * 0.1);
        let target = 0.4;

        let first = gru.train_step(seq.view(), target, 0.05, 5.0);
        for _ in 0..200 {
            gru.train_step(seq.view(), target, 0.05, 5.0);
        }
        let last = (gru.forward(seq.view()) - target).powi(2);
        assert!(
            last < first,
            "loss did not decrease: first {first}, last {last}"
        );
        assert!(last < 1e-3, "loss still high after training: {last}");
    }

    #[test]
    fn gradients_match_finite_differences() {
        // Spot-check BPTT against a numerical gradient on one readout weight
        // and one recurrent weight.
        let mut gru = Gru::new(2, 4, &mut rng());
        let seq = Array2::from_shape_fn((5, 2), |(i, j)| (i as f64 - j as f64) * 0.2);
        let target = 0.3;
        let eps = 1e-6;

        let loss = |g: &Gru| (g.forward(seq.view()) - target).powi(2);

        let (y, h_final, caches) = gru.forward_cached(seq.view());
        let grads = gru.backward(seq.view(), &h_final, &caches, 2.0 * (y - target));

        // Readout weight 0
        let analytic = grads.w_out[0];
        let original = gru.w_out[0];
        gru.w_out[0] = original + eps;
        let plus = loss(&gru);
        gru.w_out[0] = original - eps;
        let minus = loss(&gru);
        gru.w_out[0] = original;
        let numeric = (plus - minus) / (2.0 * eps);
        assert!(
            (analytic - numeric).abs() < 1e-4,
            "w_out grad mismatch: analytic {analytic}, numeric {numeric}"
        );

        // Recurrent candidate weight (0, 0)
        let analytic = grads.w_hn[[0, 0]];
        let original = gru.cell.w_hn[[0, 0]];
        gru.cell.w_hn[[0, 0]] = original + eps;
        let plus = loss(&gru);
        gru.cell.w_hn[[0, 0]] = original - eps;
        let minus = loss(&gru);
        gru.cell.w_hn[[0, 0]] = original;
        let numeric = (plus - minus) / (2.0 * eps);
        assert!(
            (analytic - numeric).abs() < 1e-4,
            "w_hn grad mismatch: analytic {analytic}, numeric {numeric}"
        );
    }

    #[test]
    fn weights_roundtrip_through_artifact() {
        let gru = Gru::new(3, 5, &mut rng());
        let seq = Array2::from_elem((8, 3), 0.25);
        let expected = gru.forward(seq.view());

        let weights = gru.to_weights();
        let json = serde_json::to_string(&weights).unwrap();
        let back: GruWeights = serde_json::from_str(&json).unwrap();
        let restored = Gru::from_weights(&back).unwrap();

        assert_eq!(restored.forward(seq.view()), expected);
    }

    #[test]
    fn inconsistent_weights_rejected() {
        let mut weights = Gru::new(3, 5, &mut rng()).to_weights();
        weights.w_out.pop();
        assert!(Gru::from_weights(&weights).is_none());
    }
}
