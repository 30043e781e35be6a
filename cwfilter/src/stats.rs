use core::borrow::Borrow;
use num_traits::Float;

///
/// Compute the arithmetic mean of `y`.
///
/// Returns the mean and the number of points averaged. An empty input gives `(0, 0)`.
///
/// ```
/// use approx::assert_relative_eq;
/// use cwfilter::stats::mean;
///
/// let y: [f64; 5] = [1., 2., 3., 4., 5.];
/// let (m, n): (f64, usize) = mean(y.iter());
/// assert_relative_eq!(m, 3.0);
/// assert_eq!(n, 5);
/// ```
///
pub fn mean<YI, F>(y: YI) -> (F, usize)
where
    F: Float,
    YI: Iterator,
    YI::Item: Borrow<F>,
{
    let (sum, count) = y.fold((F::zero(), 0usize), |acc, yi| {
        (acc.0 + *yi.borrow(), acc.1 + 1)
    });
    if count > 0 {
        (sum / F::from(count).unwrap_or_else(F::nan), count)
    } else {
        (F::zero(), 0)
    }
}

///
/// Compute the mean of the squares of `y`, the average power of a zero-mean series.
///
/// Returns the mean square and the number of points averaged.
///
/// ```
/// use cwfilter::stats::mean_square;
///
/// let (p, n): (f64, usize) = mean_square([1.0f64, -1.0, 3.0, -3.0].iter());
/// assert_eq!(p, 5.0);
/// assert_eq!(n, 4);
/// ```
///
pub fn mean_square<YI, F>(y: YI) -> (F, usize)
where
    F: Float,
    YI: Iterator,
    YI::Item: Borrow<F>,
{
    mean(y.map(|yi| {
        let v = *yi.borrow();
        v * v
    }))
}

/// Subtract the mean of `y` from every sample and return the mean that was removed.
pub fn remove_mean<F: Float>(y: &mut [F]) -> F {
    let (m, _) = mean(y.iter());
    for v in y.iter_mut() {
        *v = *v - m;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_inputs() {
        let empty: [f64; 0] = [];
        assert_eq!(mean::<_, f64>(empty.iter()), (0.0, 0));
        assert_eq!(mean_square::<_, f64>(empty.iter()), (0.0, 0));
    }

    #[test]
    fn mean_of_owned_items() {
        let (m, n) = mean::<_, f32>((1..=4).map(|i| i as f32));
        assert_relative_eq!(m, 2.5);
        assert_eq!(n, 4);
    }

    #[test]
    fn remove_mean_centers_the_series() {
        let mut y = vec![2.0f64, 4.0, 9.0];
        let m = remove_mean(&mut y);
        assert_relative_eq!(m, 5.0);
        assert_eq!(y, vec![-3.0, -1.0, 4.0]);
        let (after, _) = mean::<_, f64>(y.iter());
        assert_relative_eq!(after, 0.0);
    }

    #[test]
    fn mean_square_of_a_sine_is_half_the_squared_amplitude() {
        let n = 1000;
        let y: Vec<f64> = (0..n)
            .map(|i| 3.0 * (2.0 * core::f64::consts::PI * 5.0 * i as f64 / n as f64).sin())
            .collect();
        let (p, _) = mean_square::<_, f64>(y.iter());
        assert_relative_eq!(p, 4.5, epsilon = 1e-9);
    }
}
