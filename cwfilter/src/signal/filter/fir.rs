use crate::kernel::{ConfigError, ExecInvariantViolation};
use crate::signal::traits::{DigitalFilter, Window};
use itertools::Itertools;
use nalgebra::Complex;

/// What an FIR filter reads when its kernel hangs past either end of the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgePolicy {
    /// Samples outside the input are zero.
    #[default]
    Zero,
    /// Samples outside the input repeat the nearest edge sample.
    Repeat,
}

/// Finite impulse response filter with a centered kernel.
///
/// For `M` coefficients `h` and an integer `delay`
///
/// ```text
/// y[n] = sum_i h[i] x[n + M/2 - i - delay]
/// ```
///
/// (`M/2` rounded down), so with `delay = 0` the middle tap lines up with the output sample
/// and the transfer function is `sum_i h[i] z^(M/2 - i - delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FirFilter {
    pub(crate) coeffs: Vec<f64>,
    pub(crate) delay: isize,
    pub(crate) edge: EdgePolicy,
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = core::f64::consts::PI * x;
        px.sin() / px
    }
}

impl FirFilter {
    /// Wrap explicit coefficients. Zero delay, zero edges.
    pub fn try_new(coeffs: Vec<f64>) -> Result<Self, ConfigError> {
        if coeffs.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "coeffs" });
        }
        Ok(Self {
            coeffs,
            delay: 0,
            edge: EdgePolicy::Zero,
        })
    }

    /// Shift the kernel by `delay` samples.
    pub fn with_delay(mut self, delay: isize) -> Self {
        self.delay = delay;
        self
    }

    /// Choose what is read past the input edges.
    pub fn with_edge(mut self, edge: EdgePolicy) -> Self {
        self.edge = edge;
        self
    }

    /// Windowed sinc lowpass with cutoff `w` (normalized to Nyquist).
    ///
    /// ## Parameters
    /// * `w`: cutoff in `(0, 1]`.
    /// * `max_lobes`: number of sinc lobes kept on each side; the kernel has
    ///   `floor(2 * max_lobes / w) + 1` taps.
    /// * `window`: optional taper applied to the truncated kernel.
    pub fn sinc(w: f64, max_lobes: usize, window: Option<&dyn Window>) -> Result<Self, ConfigError> {
        if !(w > 0.0 && w <= 1.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "w",
                reason: "cutoff must lie in (0, 1]",
            });
        }
        if max_lobes == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "max_lobes",
                reason: "at least one lobe is required",
            });
        }
        let n = (2.0 * max_lobes as f64 / w).floor() as usize + 1;
        let half = (n / 2) as f64;
        let mut coeffs: Vec<f64> = (0..n)
            .map(|i| w * sinc(w * (i as f64 - half)))
            .collect();
        if let Some(window) = window {
            window.apply(&mut coeffs);
        }
        Self::try_new(coeffs)
    }

    /// Normalized Gaussian smoother with `2 * ceil(nsigma * sigma) + 1` taps.
    ///
    /// `nsigma` defaults to 3.
    pub fn gaussian(sigma: f64, nsigma: Option<f64>) -> Result<Self, ConfigError> {
        let nsigma = nsigma.unwrap_or(3.0);
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(ConfigError::InvalidArgument {
                arg: "sigma",
                reason: "sigma must be positive and finite",
            });
        }
        if !(nsigma > 0.0) || !nsigma.is_finite() {
            return Err(ConfigError::InvalidArgument {
                arg: "nsigma",
                reason: "nsigma must be positive and finite",
            });
        }
        let half = (nsigma * sigma).ceil() as isize;
        let raw = (-half..=half)
            .map(|i| {
                let x = i as f64;
                (-x * x / (2.0 * sigma * sigma)).exp()
            })
            .collect_vec();
        let sum: f64 = raw.iter().sum();
        Self::try_new(raw.into_iter().map(|c| c / sum).collect())
    }

    /// Moving average over `width` samples.
    pub fn boxcar(width: usize) -> Result<Self, ConfigError> {
        if width == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "width",
                reason: "width must be greater than zero",
            });
        }
        Self::try_new(vec![1.0 / width as f64; width])
    }

    /// Finite difference of the given order, scaled so the absolute taps sum to one.
    pub fn difference(order: usize) -> Result<Self, ConfigError> {
        if order == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "order",
                reason: "difference order must be at least 1",
            });
        }
        let mut coeffs = Vec::with_capacity(order + 1);
        let mut binom = 1.0f64;
        for i in 0..=order {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            coeffs.push(sign * binom);
            binom = binom * (order - i) as f64 / (i + 1) as f64;
        }
        let norm: f64 = coeffs.iter().map(|c| c.abs()).sum();
        Self::try_new(coeffs.into_iter().map(|c| c / norm).collect())
    }

    /// Filter coefficients in kernel order.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Kernel shift in samples.
    pub fn delay(&self) -> isize {
        self.delay
    }

    /// Edge handling.
    pub fn edge(&self) -> EdgePolicy {
        self.edge
    }

    #[inline]
    fn offset(&self) -> isize {
        (self.coeffs.len() / 2) as isize - self.delay
    }
}

impl DigitalFilter for FirFilter {
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        if out.len() != input.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: input.len(),
                got: out.len(),
            });
        }
        let len = input.len() as isize;
        if len == 0 {
            return Ok(());
        }
        let offset = self.offset();
        for (n, y) in out.iter_mut().enumerate() {
            let base = n as isize + offset;
            *y = self
                .coeffs
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let idx = base - i as isize;
                    let x = if (0..len).contains(&idx) {
                        input[idx as usize]
                    } else {
                        match self.edge {
                            EdgePolicy::Zero => 0.0,
                            EdgePolicy::Repeat => input[idx.clamp(0, len - 1) as usize],
                        }
                    };
                    h * x
                })
                .sum();
        }
        Ok(())
    }

    fn transfer(&self, z: Complex<f64>) -> Complex<f64> {
        let offset = self.offset();
        self.coeffs
            .iter()
            .enumerate()
            .fold(Complex::new(0.0, 0.0), |acc, (i, h)| {
                acc + z.powi((offset - i as isize) as i32) * *h
            })
    }
}
