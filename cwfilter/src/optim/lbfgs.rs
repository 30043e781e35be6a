use super::{BoundedMinimizer, FitError, Minimum, Objective, ParamSpec, Verbosity};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use core::cell::{Cell, RefCell};
use nalgebra::DMatrix;
use tracing::{debug, info, trace, warn};

type LineSearch = MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>;
type Solver = LBFGS<LineSearch, Vec<f64>, Vec<f64>, f64>;

/// [`BoundedMinimizer`] using `argmin`'s L-BFGS with a More-Thuente line search.
///
/// Bounded parameters are optimized in an unconstrained internal coordinate `q` with
/// `p = lo + (hi - lo) (sin q + 1) / 2`, so every evaluated point respects the bounds.
/// Unbounded parameters are passed through unchanged.
///
/// Standard errors come from the inverse of a central-difference Hessian of the analytic
/// gradient at the minimum, `sigma_i = sqrt(2 (H^-1)_ii)`, which is the one-sigma error
/// when the cost is a chi-square. They are `NaN` where the Hessian cannot be inverted or the
/// curvature is negative.
///
/// The returned point is the lowest-cost point evaluated during the run. If the backend
/// stops with an error (typically a line search that can make no further progress at the
/// numerical floor) that point is still returned, with a warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LbfgsMinimizer {
    /// Iteration cap.
    pub max_iters: u64,
    /// Number of correction pairs kept by L-BFGS.
    pub memory: usize,
    /// Stop once the internal gradient norm falls below this.
    pub tol_grad: f64,
    /// Stop once an iteration changes the cost by less than this.
    pub tol_cost: f64,
}

impl Default for LbfgsMinimizer {
    fn default() -> Self {
        Self {
            max_iters: 500,
            memory: 7,
            tol_grad: 1e-10,
            tol_cost: 1e-13,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mapping {
    Free,
    Sine { lo: f64, hi: f64 },
}

impl Mapping {
    fn from_spec(spec: &ParamSpec) -> Self {
        match spec.bounds {
            Some((lo, hi)) => Mapping::Sine { lo, hi },
            None => Mapping::Free,
        }
    }

    fn to_external(self, q: f64) -> f64 {
        match self {
            Mapping::Free => q,
            Mapping::Sine { lo, hi } => lo + (hi - lo) * (q.sin() + 1.0) / 2.0,
        }
    }

    fn to_internal(self, p: f64) -> f64 {
        match self {
            Mapping::Free => p,
            Mapping::Sine { lo, hi } => (2.0 * (p - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin(),
        }
    }

    fn derivative(self, q: f64) -> f64 {
        match self {
            Mapping::Free => 1.0,
            Mapping::Sine { lo, hi } => (hi - lo) / 2.0 * q.cos(),
        }
    }
}

struct Transformed<'a> {
    objective: &'a dyn Objective,
    mappings: &'a [Mapping],
    verbosity: Verbosity,
    best: &'a RefCell<Option<(Vec<f64>, f64)>>,
    evaluations: &'a Cell<u64>,
}

impl Transformed<'_> {
    fn external(&self, q: &[f64]) -> Vec<f64> {
        q.iter()
            .zip(self.mappings)
            .map(|(qi, m)| m.to_external(*qi))
            .collect()
    }
}

impl CostFunction for Transformed<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, q: &Self::Param) -> Result<Self::Output, ArgminError> {
        let p = self.external(q);
        let cost = self.objective.value(&p);
        self.evaluations.set(self.evaluations.get() + 1);
        if self.verbosity >= Verbosity::Evaluations {
            debug!(cost, params = ?p, "cost evaluation");
        }
        if cost.is_finite() {
            let mut best = self.best.borrow_mut();
            if best.as_ref().is_none_or(|(_, c)| cost < *c) {
                *best = Some((p, cost));
            }
        }
        Ok(cost)
    }
}

impl Gradient for Transformed<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, q: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let p = self.external(q);
        let mut grad = vec![0.0; p.len()];
        self.objective.gradient(&p, &mut grad);
        for ((g, m), qi) in grad.iter_mut().zip(self.mappings).zip(q) {
            *g *= m.derivative(*qi);
        }
        Ok(grad)
    }
}

fn validate(specs: &[ParamSpec]) -> Result<(), FitError> {
    if specs.is_empty() {
        return Err(FitError::Domain("no parameters to fit".into()));
    }
    for (i, spec) in specs.iter().enumerate() {
        if !spec.value.is_finite() {
            return Err(FitError::Domain(format!(
                "parameter {i} starts at a non-finite value"
            )));
        }
        if let Some((lo, hi)) = spec.bounds {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(FitError::Domain(format!(
                    "parameter {i} has invalid bounds ({lo}, {hi})"
                )));
            }
            if spec.value < lo || spec.value > hi {
                return Err(FitError::Domain(format!(
                    "parameter {i} starts at {} outside ({lo}, {hi})",
                    spec.value
                )));
            }
        }
    }
    Ok(())
}

fn difference_step(spec: &ParamSpec, p: f64) -> f64 {
    let h = 1e-2 * spec.step.abs();
    if h.is_finite() && h > 0.0 {
        h
    } else {
        1e-6 * p.abs().max(1.0)
    }
}

/// One-sigma errors from the inverse central-difference Hessian of `objective`'s gradient.
pub(crate) fn standard_errors(
    objective: &dyn Objective,
    params: &[f64],
    specs: &[ParamSpec],
) -> Vec<f64> {
    let n = params.len();
    let mut hess = DMatrix::<f64>::zeros(n, n);
    let mut plus = vec![0.0; n];
    let mut minus = vec![0.0; n];
    let mut probe = params.to_vec();
    for (j, spec) in specs.iter().enumerate().take(n) {
        let h = difference_step(spec, params[j]);
        probe[j] = params[j] + h;
        objective.gradient(&probe, &mut plus);
        probe[j] = params[j] - h;
        objective.gradient(&probe, &mut minus);
        probe[j] = params[j];
        for i in 0..n {
            hess[(i, j)] = (plus[i] - minus[i]) / (2.0 * h);
        }
    }
    let symmetric = (&hess + hess.transpose()) * 0.5;
    match symmetric.try_inverse() {
        Some(cov) => (0..n).map(|i| (2.0 * cov[(i, i)]).sqrt()).collect(),
        None => vec![f64::NAN; n],
    }
}

impl LbfgsMinimizer {
    fn solver(&self) -> Result<Solver, ArgminError> {
        let linesearch: LineSearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
        LBFGS::new(linesearch, self.memory)
            .with_tolerance_grad(self.tol_grad)?
            .with_tolerance_cost(self.tol_cost)
    }
}

impl BoundedMinimizer for LbfgsMinimizer {
    fn minimize(
        &self,
        objective: &dyn Objective,
        specs: &[ParamSpec],
        verbosity: Verbosity,
    ) -> Result<Minimum, FitError> {
        validate(specs)?;

        let start: Vec<f64> = specs.iter().map(|s| s.value).collect();
        let start_cost = objective.value(&start);
        if !start_cost.is_finite() {
            return Err(FitError::NonFinite);
        }
        match verbosity {
            Verbosity::Quiet => trace!(nparams = specs.len(), start_cost, "starting l-bfgs"),
            _ => info!(nparams = specs.len(), start_cost, "starting l-bfgs"),
        }

        let mappings: Vec<Mapping> = specs.iter().map(Mapping::from_spec).collect();
        let init: Vec<f64> = start
            .iter()
            .zip(&mappings)
            .map(|(p, m)| m.to_internal(*p))
            .collect();

        let best = RefCell::new(Some((start.clone(), start_cost)));
        let evaluations = Cell::new(0u64);
        let problem = Transformed {
            objective,
            mappings: &mappings,
            verbosity,
            best: &best,
            evaluations: &evaluations,
        };
        let solver = self
            .solver()
            .map_err(|e| FitError::Optimizer(e.to_string()))?;

        let iterations = match Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(self.max_iters))
            .run()
        {
            Ok(res) => {
                let state = res.state();
                trace!(termination = ?state.get_termination_reason(), "l-bfgs finished");
                state.get_iter()
            }
            Err(err) => {
                warn!(error = %err, "l-bfgs stopped early, keeping the best point evaluated");
                0
            }
        };

        let Some((params, cost)) = best.into_inner() else {
            return Err(FitError::Optimizer(
                "no finite cost was evaluated".into(),
            ));
        };
        let errors = standard_errors(objective, &params, specs);

        match verbosity {
            Verbosity::Quiet => trace!(
                cost,
                iterations,
                evaluations = evaluations.get(),
                "l-bfgs minimum"
            ),
            _ => info!(
                cost,
                iterations,
                evaluations = evaluations.get(),
                params = ?params,
                errors = ?errors,
                "l-bfgs minimum"
            ),
        }

        Ok(Minimum {
            params,
            errors,
            cost,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Quadratic {
        center: Vec<f64>,
    }

    impl Objective for Quadratic {
        fn value(&self, params: &[f64]) -> f64 {
            params
                .iter()
                .zip(&self.center)
                .map(|(p, c)| (p - c) * (p - c))
                .sum()
        }

        fn gradient(&self, params: &[f64], grad: &mut [f64]) {
            for ((g, p), c) in grad.iter_mut().zip(params).zip(&self.center) {
                *g = 2.0 * (p - c);
            }
        }
    }

    struct Coupled;

    impl Objective for Coupled {
        fn value(&self, p: &[f64]) -> f64 {
            (p[0] - 1.0).powi(2) + (p[1] + 2.0).powi(2) + (p[0] - 1.0) * (p[1] + 2.0)
        }

        fn gradient(&self, p: &[f64], grad: &mut [f64]) {
            grad[0] = 2.0 * (p[0] - 1.0) + (p[1] + 2.0);
            grad[1] = 2.0 * (p[1] + 2.0) + (p[0] - 1.0);
        }
    }

    #[test]
    fn free_quadratic_minimum_and_errors() {
        let objective = Quadratic {
            center: vec![3.0, -1.0],
        };
        let specs = [ParamSpec::free(0.0, 0.1), ParamSpec::free(0.0, 0.1)];
        let min = LbfgsMinimizer::default()
            .minimize(&objective, &specs, Verbosity::Quiet)
            .expect("minimize");
        assert_abs_diff_eq!(min.params[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(min.params[1], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(min.cost, 0.0, epsilon = 1e-10);
        for e in &min.errors {
            assert_abs_diff_eq!(*e, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn coupled_errors_follow_the_covariance() {
        let specs = [ParamSpec::free(0.0, 0.1), ParamSpec::free(0.0, 0.1)];
        let min = LbfgsMinimizer::default()
            .minimize(&Coupled, &specs, Verbosity::Summary)
            .expect("minimize");
        assert_abs_diff_eq!(min.params[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(min.params[1], -2.0, epsilon = 1e-6);
        for e in &min.errors {
            assert_abs_diff_eq!(*e, (4.0f64 / 3.0).sqrt(), epsilon = 1e-6);
        }
    }

    #[test]
    fn bounded_parameter_stays_inside() {
        let objective = Quadratic {
            center: vec![5.0, 0.5],
        };
        let specs = [
            ParamSpec::bounded(1.0, 0.1, 0.0, 2.0),
            ParamSpec::bounded(0.2, 0.1, 0.0, 2.0),
        ];
        let min = LbfgsMinimizer::default()
            .minimize(&objective, &specs, Verbosity::Evaluations)
            .expect("minimize");
        assert!(min.params[0] <= 2.0);
        assert_abs_diff_eq!(min.params[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(min.params[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn mapping_round_trips_interior_points() {
        let m = Mapping::Sine { lo: -1.0, hi: 3.0 };
        for p in [-0.5, 0.0, 1.0, 2.9] {
            assert_abs_diff_eq!(m.to_external(m.to_internal(p)), p, epsilon = 1e-12);
        }
    }

    #[test]
    fn invalid_problems_are_rejected() {
        let objective = Quadratic { center: vec![0.0] };
        let min = LbfgsMinimizer::default();
        assert!(matches!(
            min.minimize(&objective, &[], Verbosity::Quiet),
            Err(FitError::Domain(_))
        ));
        assert!(matches!(
            min.minimize(
                &objective,
                &[ParamSpec::bounded(5.0, 0.1, 0.0, 1.0)],
                Verbosity::Quiet
            ),
            Err(FitError::Domain(_))
        ));
        assert!(matches!(
            min.minimize(
                &objective,
                &[ParamSpec::bounded(0.5, 0.1, 1.0, 0.0)],
                Verbosity::Quiet
            ),
            Err(FitError::Domain(_))
        ));
    }

    #[test]
    fn non_finite_start_is_rejected() {
        struct Nan;
        impl Objective for Nan {
            fn value(&self, _: &[f64]) -> f64 {
                f64::NAN
            }
            fn gradient(&self, _: &[f64], grad: &mut [f64]) {
                grad.fill(0.0);
            }
        }
        let err = LbfgsMinimizer::default()
            .minimize(&Nan, &[ParamSpec::free(0.0, 1.0)], Verbosity::Quiet)
            .expect_err("nan");
        assert_eq!(err, FitError::NonFinite);
    }

    #[test]
    fn singular_curvature_gives_nan_errors() {
        struct Flat;
        impl Objective for Flat {
            fn value(&self, p: &[f64]) -> f64 {
                (p[0] - 1.0).powi(2)
            }
            fn gradient(&self, p: &[f64], grad: &mut [f64]) {
                grad[0] = 2.0 * (p[0] - 1.0);
                grad[1] = 0.0;
            }
        }
        let specs = [ParamSpec::free(0.0, 0.1), ParamSpec::free(0.0, 0.1)];
        let errors = standard_errors(&Flat, &[1.0, 0.0], &specs);
        assert!(errors.iter().all(|e| e.is_nan()));
    }
}
