//! Bounded minimization capability.
//!
//! Callers describe their problem with an [`Objective`] (value plus analytic gradient) and
//! one [`ParamSpec`] per parameter. A [`BoundedMinimizer`] returns the best parameters it
//! found together with standard-error estimates. [`LbfgsMinimizer`] is the default
//! implementation, built on `argmin`.

use core::fmt;

mod lbfgs;

pub use lbfgs::*;

/// A differentiable scalar function of a parameter vector.
pub trait Objective {
    /// Cost at `params`.
    fn value(&self, params: &[f64]) -> f64;

    /// Gradient of [`Objective::value`] at `params`, written into `grad`
    /// (`grad.len() == params.len()`).
    fn gradient(&self, params: &[f64], grad: &mut [f64]);
}

/// Starting value, characteristic step and optional box constraint for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Starting value.
    pub value: f64,
    /// Scale on which the cost changes appreciably. Used for numerical derivatives.
    pub step: f64,
    /// Inclusive `(lower, upper)` limits.
    pub bounds: Option<(f64, f64)>,
}

impl ParamSpec {
    /// Unbounded parameter.
    pub fn free(value: f64, step: f64) -> Self {
        Self {
            value,
            step,
            bounds: None,
        }
    }

    /// Parameter limited to `[lower, upper]`.
    pub fn bounded(value: f64, step: f64, lower: f64, upper: f64) -> Self {
        Self {
            value,
            step,
            bounds: Some((lower, upper)),
        }
    }
}

/// How much the minimizer reports through `tracing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Start and finish at `trace` level.
    #[default]
    Quiet,
    /// Start and finish at `info` level.
    Summary,
    /// Summary plus every cost evaluation at `debug` level.
    Evaluations,
}

/// Result of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Best parameters found, within their bounds.
    pub params: Vec<f64>,
    /// One-sigma errors, `NaN` where the curvature could not be inverted.
    pub errors: Vec<f64>,
    /// Cost at `params`.
    pub cost: f64,
    /// Solver iterations used.
    pub iterations: u64,
}

/// Errors raised while setting up or running a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// The inputs cannot describe a valid problem.
    Domain(String),
    /// The optimizer backend failed without producing a usable point.
    Optimizer(String),
    /// The cost is not finite at the starting point.
    NonFinite,
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::Domain(reason) => write!(f, "Invalid fit problem: {reason}"),
            FitError::Optimizer(reason) => write!(f, "Optimizer failed: {reason}"),
            FitError::NonFinite => write!(f, "Cost is not finite at the starting point."),
        }
    }
}

impl std::error::Error for FitError {}

/// Minimization of an [`Objective`] subject to per-parameter box constraints.
pub trait BoundedMinimizer {
    /// Minimize `objective` starting from `specs`.
    fn minimize(
        &self,
        objective: &dyn Objective,
        specs: &[ParamSpec],
        verbosity: Verbosity,
    ) -> Result<Minimum, FitError>;
}
