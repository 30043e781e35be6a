/// Unwrap a sequence by removing jumps larger than half a `period`.
///
/// Same idea as numpy's `unwrap(p, period=period)`: every time two consecutive samples
/// differ by more than `period / 2`, a whole multiple of `period` is added to the rest of
/// the sequence so that the output is continuous. The first sample is never changed.
///
/// # Examples
/// ```
/// use cwfilter_core::num_rs::unwrap;
///
/// let wrapped = [350.0f64, 10.0, 30.0, 5.0, 340.0];
/// let unwrapped = unwrap(&wrapped, 360.0);
/// assert_eq!(unwrapped, vec![350.0, 370.0, 390.0, 365.0, 340.0]);
/// ```
pub fn unwrap(values: &[f64], period: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return out;
    };
    out.push(first);

    let half = period / 2.0;
    let mut adjust = 0.0;
    for pair in values.windows(2) {
        let step = pair[1] - pair[0];
        if step > half {
            adjust -= period * ((step - half) / period).ceil().max(1.0);
        } else if step < -half {
            adjust += period * ((-step - half) / period).ceil().max(1.0);
        }
        out.push(pair[1] + adjust);
    }
    out
}

/// In-place variant of [`unwrap`].
pub fn unwrap_in_place(values: &mut [f64], period: f64) {
    let unwrapped = unwrap(values, period);
    values.copy_from_slice(&unwrapped);
}

#[cfg(test)]
mod tests {
    use super::{unwrap, unwrap_in_place};
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_and_single() {
        assert!(unwrap(&[], 360.0).is_empty());
        assert_eq!(unwrap(&[42.0], 360.0), vec![42.0]);
    }

    #[test]
    fn continuous_sequence_untouched() {
        let x = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(unwrap(&x, 360.0), x.to_vec());
    }

    #[test]
    fn descending_ramp_through_zero() {
        // A linear phase that keeps decreasing, wrapped into [0, 360).
        let wrapped: Vec<f64> = (0..20)
            .map(|i| (100.0 - 40.0 * i as f64).rem_euclid(360.0))
            .collect();
        let unwrapped = unwrap(&wrapped, 360.0);
        for (i, u) in unwrapped.iter().enumerate() {
            assert_abs_diff_eq!(*u, 100.0 - 40.0 * i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn radians_and_in_place() {
        let pi = core::f64::consts::PI;
        let mut x = vec![3.0, -3.0, -2.5];
        unwrap_in_place(&mut x, 2.0 * pi);
        assert_abs_diff_eq!(x[1], -3.0 + 2.0 * pi, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], -2.5 + 2.0 * pi, epsilon = 1e-12);
    }
}
