//! Trait interfaces for signal-processing capabilities.
//!
//! Filters, the FFT, interpolation and windows are all consumed through these traits so that
//! the sine subtraction engine and the response analyzer never name a concrete backend.

use crate::kernel::{ExecInvariantViolation, Read1D, Write1D};
use crate::signal::filter::design::ZpkIirFilter;
use crate::signal::filter::FrequencyResponse;
use nalgebra::Complex;

/// A linear digital filter applied to a whole, finite sequence.
///
/// Implementors provide the sample loop ([`DigitalFilter::filter_into`]) and the
/// z-domain transfer function. Everything else is derived from those two.
///
/// The trait is object safe so filters of different kinds can be chained in a
/// [`FilterSeries`](crate::signal::filter::FilterSeries).
pub trait DigitalFilter {
    /// Filter `input` into `out`. Both slices must have the same length.
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation>;

    /// Evaluate the transfer function `H(z)` at an arbitrary complex point.
    fn transfer(&self, z: Complex<f64>) -> Complex<f64>;

    /// Filter `input` into a freshly allocated vector.
    fn filter_alloc(&self, input: &[f64]) -> Result<Vec<f64>, ExecInvariantViolation> {
        let mut out = vec![0.0; input.len()];
        self.filter_into(input, &mut out)?;
        Ok(out)
    }

    /// Replace `data` with its filtered version.
    fn filter_in_place(&self, data: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        let input = data.to_vec();
        self.filter_into(&input, data)
    }

    /// Filter through the generic 1D adapters.
    fn run_into<I, O>(&self, input: &I, out: &mut O) -> Result<(), ExecInvariantViolation>
    where
        Self: Sized,
        I: Read1D<f64> + ?Sized,
        O: Write1D<f64> + ?Sized,
    {
        let input = input.read_slice().map_err(ExecInvariantViolation::from)?;
        let out = out.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        self.filter_into(input, out)
    }

    /// Response of the filter to a unit impulse placed at index `delay` of an `n` sample
    /// sequence.
    fn impulse(&self, n: usize, delay: usize) -> Result<Vec<f64>, ExecInvariantViolation> {
        if delay >= n {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "impulse position must lie inside the sequence",
            });
        }
        let mut input = vec![0.0; n];
        input[delay] = 1.0;
        self.filter_alloc(&input)
    }

    /// Amplitude, phase and group-delay curves over `n` points of the unit circle.
    fn response(&self, n: usize) -> Result<FrequencyResponse, ExecInvariantViolation> {
        crate::signal::filter::frequency_response(self, n)
    }

    /// Filter values together with their one-sigma errors.
    ///
    /// Errors are filtered as variances and mapped back, `sqrt(|filter(err^2)|)`.
    fn filter_with_errors(
        &self,
        values: &[f64],
        errors: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), ExecInvariantViolation> {
        if values.len() != errors.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "errors",
                expected: values.len(),
                got: errors.len(),
            });
        }
        let filtered = self.filter_alloc(values)?;
        let variance: Vec<f64> = errors.iter().map(|e| e * e).collect();
        let mut propagated = self.filter_alloc(&variance)?;
        for e in propagated.iter_mut() {
            *e = e.abs().sqrt();
        }
        Ok((filtered, propagated))
    }
}

impl<T: DigitalFilter + ?Sized> DigitalFilter for Box<T> {
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        (**self).filter_into(input, out)
    }

    fn transfer(&self, z: Complex<f64>) -> Complex<f64> {
        (**self).transfer(z)
    }
}

/// IIR design capability.
pub trait IirDesign {
    /// Run the design and return the filter together with its analog and digital ZPK forms.
    fn run_alloc(&self) -> Result<ZpkIirFilter, ExecInvariantViolation>;
}

/// Forward FFT of real input.
pub trait RealFft {
    /// Transform `input` zero-padded (or truncated) to `nfft` samples.
    ///
    /// Returns the `nfft / 2 + 1` non-negative frequency bins.
    fn rfft(
        &mut self,
        input: &[f64],
        nfft: usize,
    ) -> Result<Vec<Complex<f64>>, ExecInvariantViolation>;
}

/// Resampling of an irregular `(x, y)` series onto a uniform grid.
pub trait Interpolate {
    /// Sample `(x, y)` at `x[0], x[0] + dt, ...` up to and including `x[n - 1]` when it
    /// falls on the grid. `x` must be increasing.
    fn uniform(&self, x: &[f64], y: &[f64], dt: f64) -> Result<Vec<f64>, ExecInvariantViolation>;
}

/// A tapering window applied in place.
pub trait Window {
    /// Multiply `data` by the window evaluated over `data.len()` points.
    fn apply(&self, data: &mut [f64]);

    /// The window coefficients for a length `n` sequence.
    fn coefficients(&self, n: usize) -> Vec<f64> {
        let mut w = vec![1.0; n];
        self.apply(&mut w);
        w
    }
}
