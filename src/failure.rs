// Wear-induced failure models. Workers accumulate fatigue H while moving and
// working; once per step the kernel asks the model how likely the fatigue
// accrued since the last check (delta_H) is to break the worker.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::fmt;

pub trait FailureModel: Send + Sync + fmt::Debug {
    /// Marginal probability of having failed by fatigue level `h`.
    /// Used by planners to discount a worker's effective rates.
    fn failure_prob(&self, h: f64) -> f64;

    /// Probability of failing during this step, given survival up to `h`
    /// and `delta_h` fatigue accrued since the previous check.
    fn failure_prob_step(&self, h: f64, delta_h: f64) -> f64;

    fn name(&self) -> &str;
}

/// Memoryless model: each unit of fresh fatigue is equally dangerous,
/// regardless of how worn the worker already is.
#[derive(Debug, Clone)]
pub struct Exponential {
    pub lambda: f64,
}

impl Exponential {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl FailureModel for Exponential {
    fn failure_prob(&self, h: f64) -> f64 {
        if h <= 0.0 || self.lambda <= 0.0 {
            return 0.0;
        }
        1.0 - (-self.lambda * h).exp()
    }

    fn failure_prob_step(&self, _h: f64, delta_h: f64) -> f64 {
        if delta_h <= 0.0 || self.lambda <= 0.0 {
            return 0.0;
        }
        1.0 - (-self.lambda * delta_h).exp()
    }

    fn name(&self) -> &str {
        "exponential"
    }
}

/// Weibull wear-out model, F(x) = 1 - exp(-(lambda*x)^k). The per-step
/// probability is the hazard conditional on survival to `h`, so that
/// F(h + dh) = F(h) + (1 - F(h)) * failure_prob_step(h, dh).
#[derive(Debug, Clone)]
pub struct Weibull {
    pub lambda: f64,
    pub k: f64,
}

impl Weibull {
    pub fn new(lambda: f64, k: f64) -> Self {
        Self { lambda, k }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        1.0 - (-(self.lambda * x).powf(self.k)).exp()
    }
}

impl FailureModel for Weibull {
    fn failure_prob(&self, h: f64) -> f64 {
        if self.lambda <= 0.0 || self.k <= 0.0 {
            return 0.0;
        }
        self.cdf(h)
    }

    fn failure_prob_step(&self, h: f64, delta_h: f64) -> f64 {
        if delta_h <= 0.0 || self.lambda <= 0.0 || self.k <= 0.0 {
            return 0.0;
        }
        let f_old = self.cdf(h.max(0.0));
        let f_new = self.cdf(h.max(0.0) + delta_h);
        if f_old >= 1.0 {
            return 1.0;
        }
        (f_new - f_old) / (1.0 - f_old)
    }

    fn name(&self) -> &str {
        "weibull"
    }
}

/// Flat per-step probability, handy for forcing failures in scenarios.
#[derive(Debug, Clone)]
pub struct Constant {
    pub prob: f64,
}

impl FailureModel for Constant {
    fn failure_prob(&self, h: f64) -> f64 {
        if h <= 0.0 || self.prob <= 0.0 {
            return 0.0;
        }
        // survival over h unit-steps at fixed prob
        1.0 - (h * (1.0 - self.prob).ln()).exp()
    }

    fn failure_prob_step(&self, _h: f64, delta_h: f64) -> f64 {
        if delta_h <= 0.0 { 0.0 } else { self.prob }
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Build a failure model from its scenario name + parameter map.
/// Unknown names and missing parameters are configuration errors.
pub fn create(name: &str, params: &HashMap<String, f64>) -> Result<Box<dyn FailureModel>> {
    let get = |key: &str| -> Result<f64> {
        params
            .get(key)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("failure model '{}' missing parameter '{}'", name, key))
    };
    match name.to_lowercase().as_str() {
        "exponential" | "exp" => Ok(Box::new(Exponential::new(get("lambda")?))),
        "weibull" => Ok(Box::new(Weibull::new(get("lambda")?, get("k")?))),
        "constant" => Ok(Box::new(Constant { prob: get("prob")? })),
        other => bail!("unknown failure model: {}", other),
    }
}
