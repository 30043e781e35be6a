use crate::kernel::ExecInvariantViolation;
use crate::signal::traits::Interpolate;

/// Piecewise-linear interpolation onto a uniform grid.
///
/// The first grid point is `x[0]`, so the first sample is reproduced exactly. Grid points are
/// generated while they do not pass `x[n - 1]` (with a relative tolerance of `1e-9 * dt`), so
/// the last sample is reproduced whenever the span is a multiple of `dt`.
///
/// # Examples
///
/// ```
/// use cwfilter::signal::resample::Linear;
/// use cwfilter::signal::traits::Interpolate;
///
/// let y = Linear
///     .uniform(&[0.0, 1.0, 3.0], &[0.0, 2.0, 6.0], 0.5)
///     .unwrap();
/// assert_eq!(y, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl Interpolate for Linear {
    fn uniform(&self, x: &[f64], y: &[f64], dt: f64) -> Result<Vec<f64>, ExecInvariantViolation> {
        if x.len() != y.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "y",
                expected: x.len(),
                got: y.len(),
            });
        }
        if x.is_empty() {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "interpolation input must be non-empty",
            });
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "interpolation step must be positive and finite",
            });
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "interpolation abscissa must be strictly increasing",
            });
        }

        let x0 = x[0];
        let span = x[x.len() - 1] - x0;
        let count = (span / dt + 1e-9).floor() as usize + 1;

        let mut out = Vec::with_capacity(count);
        let mut seg = 0usize;
        for i in 0..count {
            let t = x0 + i as f64 * dt;
            while seg + 2 < x.len() && x[seg + 1] < t {
                seg += 1;
            }
            if x.len() == 1 {
                out.push(y[0]);
                continue;
            }
            let (xa, xb) = (x[seg], x[seg + 1]);
            let frac = ((t - xa) / (xb - xa)).clamp(0.0, 1.0);
            out.push(y[seg] + frac * (y[seg + 1] - y[seg]));
        }
        Ok(out)
    }
}
