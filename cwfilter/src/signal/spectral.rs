//! Real-input FFT backed by `rustfft`.

use crate::kernel::ExecInvariantViolation;
use crate::signal::traits::RealFft;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// [`RealFft`] implementation on top of [`rustfft::FftPlanner`].
///
/// Plans are cached inside the planner, so repeated transforms of one length (the sine
/// subtraction loop transforms every trace at the same padded length on every iteration)
/// only pay for planning once. The complex work buffer is reused as well.
pub struct RustFft {
    planner: FftPlanner<f64>,
    buffer: Vec<Complex<f64>>,
}

impl RustFft {
    /// Create a transform with an empty plan cache.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::new(),
        }
    }
}

impl Default for RustFft {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RustFft {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RustFft")
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

impl RealFft for RustFft {
    fn rfft(
        &mut self,
        input: &[f64],
        nfft: usize,
    ) -> Result<Vec<Complex<f64>>, ExecInvariantViolation> {
        if nfft == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "fft length must be greater than zero",
            });
        }
        let fft = self.planner.plan_fft_forward(nfft);
        self.buffer.clear();
        self.buffer.resize(nfft, Complex::new(0.0, 0.0));
        for (dst, src) in self.buffer.iter_mut().zip(input.iter().copied()) {
            *dst = Complex::new(src, 0.0);
        }
        fft.process(&mut self.buffer);
        Ok(self.buffer[..nfft / 2 + 1].to_vec())
    }
}

/// Frequency of each one-sided bin for an `nfft` point transform of samples spaced `dt`.
pub fn rfft_frequencies(nfft: usize, dt: f64) -> Vec<f64> {
    (0..nfft / 2 + 1)
        .map(|k| k as f64 / (dt * nfft as f64))
        .collect()
}
