//! Symmetric tapering windows.
//!
//! Every window here is evaluated over `n` points with `n - 1` in the denominator, so the
//! first and last coefficients are equal. A length 1 window is the identity.

use crate::signal::traits::Window;
use core::f64::consts::PI;

/// Leaves the data untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rectangular;

/// `0.5 - 0.5 cos(2 pi i / (n - 1))`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hann;

/// `0.54 - 0.46 cos(2 pi i / (n - 1))`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hamming;

/// `0.42 - 0.5 cos(2 pi i / (n - 1)) + 0.08 cos(4 pi i / (n - 1))`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blackman;

fn apply_cosine_sum(data: &mut [f64], weights: &[f64]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let nm1 = (n - 1) as f64;
    for (i, v) in data.iter_mut().enumerate() {
        let phase = 2.0 * PI * i as f64 / nm1;
        let w: f64 = weights
            .iter()
            .enumerate()
            .map(|(k, a)| {
                let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                sign * a * (k as f64 * phase).cos()
            })
            .sum();
        *v *= w;
    }
}

impl Window for Rectangular {
    fn apply(&self, _data: &mut [f64]) {}
}

impl Window for Hann {
    fn apply(&self, data: &mut [f64]) {
        apply_cosine_sum(data, &[0.5, 0.5]);
    }
}

impl Window for Hamming {
    fn apply(&self, data: &mut [f64]) {
        apply_cosine_sum(data, &[0.54, 0.46]);
    }
}

impl Window for Blackman {
    fn apply(&self, data: &mut [f64]) {
        apply_cosine_sum(data, &[0.42, 0.5, 0.08]);
    }
}

/// Owned selector over the built-in windows, suitable for config structs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowShape {
    /// [`Rectangular`]
    #[default]
    Rectangular,
    /// [`Hann`]
    Hann,
    /// [`Hamming`]
    Hamming,
    /// [`Blackman`]
    Blackman,
}

impl Window for WindowShape {
    fn apply(&self, data: &mut [f64]) {
        match self {
            WindowShape::Rectangular => Rectangular.apply(data),
            WindowShape::Hann => Hann.apply(data),
            WindowShape::Hamming => Hamming.apply(data),
            WindowShape::Blackman => Blackman.apply(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hann_endpoints_and_center() {
        let w = Hann.coefficients(9);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[8], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn hamming_and_blackman_endpoints() {
        let w = Hamming.coefficients(17);
        assert_abs_diff_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(w[8], 1.0, epsilon = 1e-12);

        let w = Blackman.coefficients(17);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[8], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn windows_are_symmetric() {
        for shape in [
            WindowShape::Rectangular,
            WindowShape::Hann,
            WindowShape::Hamming,
            WindowShape::Blackman,
        ] {
            let w = shape.coefficients(12);
            for i in 0..6 {
                assert_abs_diff_eq!(w[i], w[11 - i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn shape_matches_unit_struct() {
        let mut a = vec![2.0; 10];
        let mut b = a.clone();
        WindowShape::Blackman.apply(&mut a);
        Blackman.apply(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn single_point_window_is_identity() {
        let mut one = [3.0];
        Hann.apply(&mut one);
        assert_eq!(one, [3.0]);
    }
}
