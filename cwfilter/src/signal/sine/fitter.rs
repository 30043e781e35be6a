use core::f64::consts::PI;

use crate::optim::{BoundedMinimizer, FitError, LbfgsMinimizer, Objective, ParamSpec, Verbosity};

use super::SineComponent;

/// Wrap `phi` into `[-pi, pi)`.
///
/// ```
/// use approx::assert_abs_diff_eq;
/// use cwfilter::signal::sine::normalize_angle;
///
/// assert_abs_diff_eq!(normalize_angle(3.0 * core::f64::consts::PI / 2.0), -core::f64::consts::FRAC_PI_2, epsilon = 1e-12);
/// assert_abs_diff_eq!(normalize_angle(0.25), 0.25);
/// ```
pub fn normalize_angle(phi: f64) -> f64 {
    phi - 2.0 * PI * ((phi + PI) / (2.0 * PI)).floor()
}

/// Mean squared residual of a shared-frequency sinusoid against several traces.
///
/// Parameters are laid out `[f, phi_0, A_0, phi_1, A_1, ...]`. The cost is the mean over
/// traces of each trace's mean squared residual.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SineFitObjective {
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
}

impl SineFitObjective {
    /// Empty objective. Bind data with [`SineFitObjective::set_xy`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebind the data, reusing the buffers of earlier calls.
    pub fn set_xy(&mut self, x: &[&[f64]], y: &[&[f64]]) {
        self.x.resize_with(x.len(), Vec::new);
        self.y.resize_with(y.len(), Vec::new);
        for (dst, src) in self.x.iter_mut().zip(x) {
            dst.clear();
            dst.extend_from_slice(src);
        }
        for (dst, src) in self.y.iter_mut().zip(y) {
            dst.clear();
            dst.extend_from_slice(src);
        }
    }

    /// Number of bound traces.
    pub fn ntraces(&self) -> usize {
        self.y.len()
    }
}

impl Objective for SineFitObjective {
    fn value(&self, params: &[f64]) -> f64 {
        let nt = self.y.len();
        if nt == 0 {
            return 0.0;
        }
        let w = 2.0 * PI * params[0];
        let mut total = 0.0;
        for (t, (x, y)) in self.x.iter().zip(&self.y).enumerate() {
            let phi = normalize_angle(params[1 + 2 * t]);
            let amp = params[2 + 2 * t];
            let sum: f64 = x
                .iter()
                .zip(y)
                .map(|(xi, yi)| {
                    let r = amp * (w * xi + phi).sin() - yi;
                    r * r
                })
                .sum();
            total += sum / x.len().max(1) as f64;
        }
        total / nt as f64
    }

    fn gradient(&self, params: &[f64], grad: &mut [f64]) {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let nt = self.y.len();
        if nt == 0 {
            return;
        }
        let w = 2.0 * PI * params[0];
        for (t, (x, y)) in self.x.iter().zip(&self.y).enumerate() {
            let phi = normalize_angle(params[1 + 2 * t]);
            let amp = params[2 + 2 * t];
            let (mut gf, mut gphi, mut gamp) = (0.0, 0.0, 0.0);
            for (xi, yi) in x.iter().zip(y) {
                let (s, c) = (w * xi + phi).sin_cos();
                let r = amp * s - yi;
                gf += r * amp * xi * c * 2.0 * PI;
                gphi += r * amp * c;
                gamp += r * s;
            }
            let scale = 2.0 / (nt * x.len().max(1)) as f64;
            grad[0] += gf * scale;
            grad[1 + 2 * t] = gphi * scale;
            grad[2 + 2 * t] = gamp * scale;
        }
    }
}

/// Starting point for [`SineFitter::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct SineGuess {
    /// Shared frequency.
    pub freq: f64,
    /// Phase per trace.
    pub phases: Vec<f64>,
    /// Amplitude per trace, strictly positive.
    pub amps: Vec<f64>,
}

/// Joint least-squares fit of one sinusoid to several traces.
///
/// Frequency is limited to one bin either side of the guess, `df = 1 / (2 dt ns)`, and
/// each amplitude to `[A / 4, 4 A]`. Phases are free.
#[derive(Debug, Clone, Default)]
pub struct SineFitter<M: BoundedMinimizer = LbfgsMinimizer> {
    objective: SineFitObjective,
    minimizer: M,
    verbosity: Verbosity,
}

impl<M: BoundedMinimizer> SineFitter<M> {
    /// Fitter driven by `minimizer`.
    pub fn new(minimizer: M) -> Self {
        Self {
            objective: SineFitObjective::new(),
            minimizer,
            verbosity: Verbosity::default(),
        }
    }

    /// Set how much the minimizer reports.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Change how much the minimizer reports.
    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// The minimizer in use.
    pub fn minimizer(&self) -> &M {
        &self.minimizer
    }

    /// Fit `y[t](x[t])` for every trace `t`.
    ///
    /// ## Parameters
    /// * `x`, `y`: one slice per trace, all of the same length (at least two samples) with
    ///   increasing, roughly uniform abscissae.
    /// * `guess`: starting frequency plus one phase and amplitude per trace.
    pub fn fit(
        &mut self,
        x: &[&[f64]],
        y: &[&[f64]],
        guess: &SineGuess,
    ) -> Result<SineComponent, FitError> {
        let nt = y.len();
        if nt == 0 || x.len() != nt {
            return Err(FitError::Domain(format!(
                "need matching non-empty trace lists, got {} abscissae and {} ordinates",
                x.len(),
                nt
            )));
        }
        if guess.phases.len() != nt || guess.amps.len() != nt {
            return Err(FitError::Domain(format!(
                "guess holds {} phases and {} amplitudes for {} traces",
                guess.phases.len(),
                guess.amps.len(),
                nt
            )));
        }
        let ns = x[0].len();
        if ns < 2 {
            return Err(FitError::Domain("need at least two samples per trace".into()));
        }
        if x.iter().zip(y).any(|(xt, yt)| xt.len() != ns || yt.len() != ns) {
            return Err(FitError::Domain(
                "every trace must have the same number of samples".into(),
            ));
        }
        if !guess.freq.is_finite() {
            return Err(FitError::Domain("frequency guess is not finite".into()));
        }

        let dt = (x[0][ns - 1] - x[0][0]) / (ns - 1) as f64;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(FitError::Domain(
                "abscissae must be increasing and finite".into(),
            ));
        }
        let df = 1.0 / (2.0 * dt * ns as f64);

        let mut specs = Vec::with_capacity(1 + 2 * nt);
        specs.push(ParamSpec::bounded(
            guess.freq,
            df / 10.0,
            guess.freq - df,
            guess.freq + df,
        ));
        for (phase, amp) in guess.phases.iter().zip(&guess.amps) {
            if !amp.is_finite() || *amp <= 0.0 {
                return Err(FitError::Domain(format!(
                    "amplitude guess must be positive and finite, got {amp}"
                )));
            }
            specs.push(ParamSpec::free(*phase, PI / ns as f64));
            specs.push(ParamSpec::bounded(
                *amp,
                1.0 / amp.sqrt(),
                0.25 * amp,
                4.0 * amp,
            ));
        }

        self.objective.set_xy(x, y);
        let minimum = self
            .minimizer
            .minimize(&self.objective, &specs, self.verbosity)?;

        let p = &minimum.params;
        let e = &minimum.errors;
        Ok(SineComponent {
            freq: p[0],
            freq_err: e[0],
            phases: (0..nt).map(|t| normalize_angle(p[1 + 2 * t])).collect(),
            phase_errs: (0..nt).map(|t| e[1 + 2 * t]).collect(),
            amps: (0..nt).map(|t| p[2 + 2 * t]).collect(),
            amp_errs: (0..nt).map(|t| e[2 + 2 * t]).collect(),
            power: minimum.cost,
        })
    }
}
