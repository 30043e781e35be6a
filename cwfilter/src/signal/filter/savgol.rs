use super::{EdgePolicy, FirFilter};
use crate::kernel::ConfigError;
use nalgebra::{DMatrix, DVector};

impl FirFilter {
    /// Savitzky-Golay smoothing or differentiating filter.
    ///
    /// Fits a degree `order` polynomial by least squares over the `nl` samples to the left
    /// and `nr` samples to the right of each output sample and evaluates its `deriv`-th
    /// derivative at the center. `nr = None` means a symmetric window (`nr = nl`).
    ///
    /// Edges repeat the boundary sample. The derivative is per sample; divide by `dt^deriv`
    /// for physical units.
    ///
    /// ## Parameters
    /// * `order`: polynomial degree, at least `deriv`.
    /// * `nl`, `nr`: window extent; `nl + nr + 1` must exceed `order`.
    /// * `deriv`: derivative order, 0 for smoothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use cwfilter::signal::filter::FirFilter;
    ///
    /// let smooth = FirFilter::savitzky_golay(0, 2, None, 0).unwrap();
    /// for c in smooth.coeffs() {
    ///     assert!((c - 0.2).abs() < 1e-12);
    /// }
    /// ```
    pub fn savitzky_golay(
        order: usize,
        nl: usize,
        nr: Option<usize>,
        deriv: usize,
    ) -> Result<Self, ConfigError> {
        let nr = nr.unwrap_or(nl);
        if deriv > order {
            return Err(ConfigError::InvalidArgument {
                arg: "deriv",
                reason: "derivative order cannot exceed the polynomial order",
            });
        }
        let size = nl + nr + 1;
        if size <= order {
            return Err(ConfigError::InvalidArgument {
                arg: "order",
                reason: "window must hold more samples than the polynomial order",
            });
        }

        let m = DMatrix::<f64>::from_fn(size, order + 1, |i, j| {
            (i as f64 - nl as f64).powi(j as i32)
        });
        let normal = m.transpose() * &m;
        let mut rhs = DVector::<f64>::zeros(order + 1);
        rhs[deriv] = 1.0;
        let y = normal
            .lu()
            .solve(&rhs)
            .ok_or(ConfigError::InvalidArgument {
                arg: "order",
                reason: "normal equations are singular",
            })?;

        let factorial: f64 = (1..=deriv).map(|k| k as f64).product();
        let weights = &m * &y;

        // weights[i] multiplies the sample at offset i - nl; the kernel runs the other way.
        let coeffs: Vec<f64> = weights.as_slice().iter().rev().map(|c| c * factorial).collect();
        let delay = (size / 2) as isize - nr as isize;
        Ok(FirFilter::try_new(coeffs)?
            .with_delay(delay)
            .with_edge(EdgePolicy::Repeat))
    }
}
