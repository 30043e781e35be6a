use crate::kernel::{ConfigError, ExecInvariantViolation};
use crate::signal::traits::DigitalFilter;
use nalgebra::Complex;

/// Direct-form IIR filter applied from zero initial state.
///
/// Computes
///
/// ```text
/// a[0] y[j] = sum_k b[k] x[j - k] - sum_{k > 0} a[k] y[j - k]
/// ```
///
/// with terms at negative indices omitted. The recursion is strictly sequential.
///
/// # Examples
///
/// ```
/// use cwfilter::signal::filter::IirFilter;
/// use cwfilter::signal::traits::DigitalFilter;
///
/// // One pole smoother: y[j] = 0.5 x[j] + 0.5 y[j - 1]
/// let filt = IirFilter::try_new(vec![0.5], vec![1.0, -0.5]).unwrap();
/// let y = filt.filter_alloc(&[1.0, 1.0, 1.0]).unwrap();
/// assert_eq!(y, vec![0.5, 0.75, 0.875]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl IirFilter {
    /// Build from feedforward `b` and feedback `a` coefficients.
    pub fn try_new(b: Vec<f64>, a: Vec<f64>) -> Result<Self, ConfigError> {
        if b.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "b" });
        }
        if a.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "a" });
        }
        if a[0] == 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "a",
                reason: "a[0] must be nonzero",
            });
        }
        Ok(Self { b, a })
    }

    /// Feedforward coefficients.
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Feedback coefficients.
    pub fn a(&self) -> &[f64] {
        &self.a
    }
}

impl DigitalFilter for IirFilter {
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        if out.len() != input.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: input.len(),
                got: out.len(),
            });
        }
        let a0 = self.a[0];
        for j in 0..input.len() {
            let mut acc = 0.0;
            for (k, bk) in self.b.iter().enumerate().take(j + 1) {
                acc += bk * input[j - k];
            }
            for (k, ak) in self.a.iter().enumerate().take(j + 1).skip(1) {
                acc -= ak * out[j - k];
            }
            out[j] = acc / a0;
        }
        Ok(())
    }

    fn transfer(&self, z: Complex<f64>) -> Complex<f64> {
        let zinv = z.inv();
        let horner = |coeffs: &[f64]| {
            coeffs
                .iter()
                .rev()
                .fold(Complex::new(0.0, 0.0), |acc, c| acc * zinv + *c)
        };
        horner(&self.b) / horner(&self.a)
    }
}
