//! Hamiltonian Monte Carlo building blocks.
//!
//! - `LogDensity`: differentiable target (log density + gradient)
//! - `transition`: one HMC proposal (leapfrog integration + Metropolis correction)
//! - `DualAveraging`: step-size adaptation toward a target acceptance rate
//! - `VarianceEstimator`: running variance used for the diagonal mass matrix
//!
//! Notation: `inv_mass` is the diagonal of M⁻¹, so momenta are drawn as
//! `p ~ Normal(0, M)` and the kinetic energy is `½ pᵀ M⁻¹ p`.

use rand::Rng;
use rand_distr::StandardNormal;

/// Energy error above which a trajectory is flagged as divergent.
const MAX_ENERGY_ERROR: f64 = 1000.0;

/// A differentiable log density over `R^dim`.
pub trait LogDensity {
    fn dim(&self) -> usize;

    /// Return `log p(q)` and write `∇ log p(q)` into `grad`.
    fn log_density_and_gradient(&self, q: &[f64], grad: &mut [f64]) -> f64;
}

/// Outcome of a single HMC transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub position: Vec<f64>,
    pub accept_prob: f64,
    pub accepted: bool,
    pub divergent: bool,
}

fn kinetic(p: &[f64], inv_mass: &[f64]) -> f64 {
    0.5 * p.iter().zip(inv_mass).map(|(pi, mi)| pi * pi * mi).sum::<f64>()
}

fn draw_momentum<R: Rng + ?Sized>(inv_mass: &[f64], rng: &mut R) -> Vec<f64> {
    inv_mass
        .iter()
        .map(|m| {
            let z: f64 = rng.sample(StandardNormal);
            z / m.sqrt()
        })
        .collect()
}

/// Integrate `n_steps` leapfrog steps in place; returns the final log density.
fn leapfrog<T: LogDensity + ?Sized>(
    target: &T,
    q: &mut [f64],
    p: &mut [f64],
    grad: &mut [f64],
    step_size: f64,
    inv_mass: &[f64],
    n_steps: usize,
) -> f64 {
    let mut lp = f64::NAN;
    for _ in 0..n_steps {
        for i in 0..q.len() {
            p[i] += 0.5 * step_size * grad[i];
            q[i] += step_size * inv_mass[i] * p[i];
        }
        lp = target.log_density_and_gradient(q, grad);
        if !lp.is_finite() {
            return lp;
        }
        for i in 0..q.len() {
            p[i] += 0.5 * step_size * grad[i];
        }
    }
    lp
}

/// One HMC transition from `q0`.
pub fn transition<T: LogDensity + ?Sized, R: Rng + ?Sized>(
    target: &T,
    q0: &[f64],
    step_size: f64,
    inv_mass: &[f64],
    n_steps: usize,
    rng: &mut R,
) -> Transition {
    let mut grad = vec![0.0; target.dim()];
    let lp0 = target.log_density_and_gradient(q0, &mut grad);
    let mut p = draw_momentum(inv_mass, rng);
    let h0 = -lp0 + kinetic(&p, inv_mass);

    let mut q = q0.to_vec();
    let lp1 = leapfrog(target, &mut q, &mut p, &mut grad, step_size, inv_mass, n_steps);
    let h1 = -lp1 + kinetic(&p, inv_mass);
    let energy_error = h1 - h0;

    if !energy_error.is_finite() || energy_error > MAX_ENERGY_ERROR {
        return Transition {
            position: q0.to_vec(),
            accept_prob: 0.0,
            accepted: false,
            divergent: true,
        };
    }

    let accept_prob = (-energy_error).exp().min(1.0);
    let accepted = rng.r#gen::<f64>() < accept_prob;
    Transition {
        position: if accepted { q } else { q0.to_vec() },
        accept_prob,
        accepted,
        divergent: false,
    }
}

/// Heuristic initial step size (Hoffman & Gelman 2014, Algorithm 4):
/// double or halve until a single leapfrog step crosses 50% acceptance.
pub fn find_reasonable_step_size<T: LogDensity + ?Sized, R: Rng + ?Sized>(
    target: &T,
    q0: &[f64],
    inv_mass: &[f64],
    initial: f64,
    rng: &mut R,
) -> f64 {
    let mut grad0 = vec![0.0; target.dim()];
    let lp0 = target.log_density_and_gradient(q0, &mut grad0);

    let accept_ratio = |eps: f64, rng: &mut R| -> f64 {
        let mut p = draw_momentum(inv_mass, rng);
        let h0 = -lp0 + kinetic(&p, inv_mass);
        let mut q = q0.to_vec();
        let mut grad = grad0.clone();
        let lp1 = leapfrog(target, &mut q, &mut p, &mut grad, eps, inv_mass, 1);
        let h1 = -lp1 + kinetic(&p, inv_mass);
        let r = (h0 - h1).exp();
        if r.is_finite() { r } else { 0.0 }
    };

    let mut eps = initial;
    let a = accept_ratio(eps, rng);
    let direction: i32 = if a > 0.5 { 1 } else { -1 };
    let factor = 2f64.powi(direction);
    for _ in 0..50 {
        let a = accept_ratio(eps, rng);
        let keep_going = if direction > 0 { a > 0.5 } else { a < 0.5 };
        if !keep_going {
            break;
        }
        eps *= factor;
    }
    eps.clamp(1e-8, 1e3)
}

/// Nesterov dual averaging of `ln ε` (Hoffman & Gelman 2014, §3.2).
#[derive(Debug, Clone)]
pub struct DualAveraging {
    target: f64,
    mu: f64,
    counter: f64,
    h_bar: f64,
    log_eps: f64,
    log_eps_bar: f64,
}

impl DualAveraging {
    const GAMMA: f64 = 0.05;
    const T0: f64 = 10.0;
    const KAPPA: f64 = 0.75;

    pub fn new(initial_step: f64, target_accept: f64) -> Self {
        Self {
            target: target_accept,
            mu: (10.0 * initial_step).ln(),
            counter: 0.0,
            h_bar: 0.0,
            log_eps: initial_step.ln(),
            log_eps_bar: initial_step.ln(),
        }
    }

    /// Restart around a new step size (after a mass-matrix update).
    pub fn restart(&mut self, step: f64) {
        *self = Self::new(step, self.target);
    }

    pub fn update(&mut self, accept_prob: f64) {
        self.counter += 1.0;
        let w = 1.0 / (self.counter + Self::T0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target - accept_prob);
        self.log_eps = self.mu - self.counter.sqrt() / Self::GAMMA * self.h_bar;
        let eta = self.counter.powf(-Self::KAPPA);
        self.log_eps_bar = eta * self.log_eps + (1.0 - eta) * self.log_eps_bar;
    }

    /// Step size to use for the next warm-up iteration.
    pub fn current(&self) -> f64 {
        self.log_eps.exp()
    }

    /// Averaged step size to freeze after warm-up.
    pub fn adapted(&self) -> f64 {
        self.log_eps_bar.exp()
    }
}

/// Welford running mean/variance per coordinate.
#[derive(Debug, Clone)]
pub struct VarianceEstimator {
    n: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl VarianceEstimator {
    pub fn new(dim: usize) -> Self {
        Self {
            n: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn add(&mut self, x: &[f64]) {
        self.n += 1;
        for i in 0..x.len() {
            let delta = x[i] - self.mean[i];
            self.mean[i] += delta / self.n as f64;
            self.m2[i] += delta * (x[i] - self.mean[i]);
        }
    }

    pub fn count(&self) -> usize {
        self.n
    }

    /// Sample variance shrunk toward `1e-3` (Stan's regularization).
    pub fn regularized_variance(&self) -> Vec<f64> {
        let n = self.n as f64;
        self.m2
            .iter()
            .map(|m2| {
                let var = if self.n > 1 { m2 / (n - 1.0) } else { 1.0 };
                (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Independent normals with given standard deviations.
    struct Gaussian {
        sd: Vec<f64>,
    }

    impl LogDensity for Gaussian {
        fn dim(&self) -> usize {
            self.sd.len()
        }

        fn log_density_and_gradient(&self, q: &[f64], grad: &mut [f64]) -> f64 {
            let mut lp = 0.0;
            for i in 0..q.len() {
                let s2 = self.sd[i] * self.sd[i];
                lp -= 0.5 * q[i] * q[i] / s2;
                grad[i] = -q[i] / s2;
            }
            lp
        }
    }

    #[test]
    fn hmc_recovers_gaussian_moments() {
        let target = Gaussian { sd: vec![1.0, 3.0] };
        let inv_mass = vec![1.0, 9.0];
        let mut rng = StdRng::seed_from_u64(7);
        let mut q = vec![0.5, -0.5];
        let mut acc = VarianceEstimator::new(2);
        for _ in 0..4000 {
            let t = transition(&target, &q, 0.4, &inv_mass, 5, &mut rng);
            q = t.position;
            acc.add(&q);
        }
        let var = acc.regularized_variance();
        assert!((var[0] - 1.0).abs() < 0.2, "var0={}", var[0]);
        assert!((var[1] - 9.0).abs() < 1.8, "var1={}", var[1]);
    }

    #[test]
    fn dual_averaging_shrinks_step_when_acceptance_is_low() {
        let mut da = DualAveraging::new(1.0, 0.9);
        for _ in 0..50 {
            da.update(0.2);
        }
        assert!(da.adapted() < 1.0);

        let mut da = DualAveraging::new(0.01, 0.6);
        for _ in 0..50 {
            da.update(1.0);
        }
        assert!(da.adapted() > 0.01);
    }

    #[test]
    fn huge_step_is_flagged_divergent() {
        let target = Gaussian { sd: vec![0.01] };
        let mut rng = StdRng::seed_from_u64(1);
        let t = transition(&target, &[0.0], 50.0, &[1.0], 10, &mut rng);
        assert!(t.divergent);
        assert_eq!(t.position, vec![0.0]);
    }

    #[test]
    fn reasonable_step_size_scales_with_target_width() {
        let mut rng = StdRng::seed_from_u64(3);
        let narrow = find_reasonable_step_size(&Gaussian { sd: vec![0.01] }, &[0.0], &[1.0], 1.0, &mut rng);
        let wide = find_reasonable_step_size(&Gaussian { sd: vec![10.0] }, &[0.0], &[1.0], 1.0, &mut rng);
        assert!(narrow < wide);
    }
}
