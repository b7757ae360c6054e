// Mean-reverting (Ornstein-Uhlenbeck) channel generator.
//
// Discrete step: x' = x + theta * (mu - x) * dt + sigma * sqrt(dt) * N(0,1)

use rand::Rng;
use std::f64::consts::PI;

/// Tick step size, in tick units
pub const DT: f64 = 1.0;

/// Parameters of one generator step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessParams {
    /// Reversion speed
    pub theta: f64,
    /// Target mean
    pub mu: f64,
    /// Volatility
    pub sigma: f64,
    pub dt: f64,
}

/// Standard normal sample via the Box-Muller transform
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); shift to (0, 1] so ln() stays finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Volatility that makes the steady-state standard deviation equal
/// `volatility_fraction * std_dev` for reversion speed `theta`.
pub fn derive_sigma(volatility_fraction: f64, std_dev: f64, theta: f64) -> f64 {
    volatility_fraction * std_dev * (2.0 * theta).sqrt()
}

/// Deterministic part of one step (no noise)
pub fn drift(current: f64, params: &ProcessParams) -> f64 {
    params.theta * (params.mu - current) * params.dt
}

/// One discrete step from `current`
pub fn step<R: Rng + ?Sized>(current: f64, params: &ProcessParams, rng: &mut R) -> f64 {
    let diffusion = params.sigma * params.dt.sqrt() * standard_normal(rng);
    current + drift(current, params) + diffusion
}
