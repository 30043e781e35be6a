use core::ops::{Mul, Sub};
use num_traits::{One, Zero};

/// Monic polynomial coefficients from a sequence of roots.
///
/// Close to numpy's `poly`, except the coefficients are returned in *ascending* power
/// order so that index `j` holds the coefficient of `x^j`. `n` roots produce `n + 1`
/// coefficients and an empty root list produces the constant polynomial `[1]`.
///
/// The product `∏ (x - root_i)` is built one factor at a time. Each step reads the
/// previous accumulator and writes into a second buffer before the two are swapped, so
/// no coefficient is read after it has been overwritten.
///
/// ## Parameters
/// * `roots` : roots of the polynomial, real or complex.
///
/// ## Returns
/// * `coeffs` : `roots.len() + 1` coefficients, `coeffs[roots.len()] == 1`.
///
/// # Examples
/// ```
/// use cwfilter_core::num_rs::poly;
///
/// // (x - 2)(x - 3) = 6 - 5x + x^2
/// let coeffs = poly(&[2.0f64, 3.0]);
/// assert_eq!(coeffs, vec![6.0, -5.0, 1.0]);
///
/// assert_eq!(poly::<f64>(&[]), vec![1.0]);
/// ```
pub fn poly<T>(roots: &[T]) -> Vec<T>
where
    T: Copy + Zero + One + Sub<Output = T> + Mul<Output = T>,
{
    let n = roots.len();
    let mut acc = vec![T::zero(); n + 1];
    let mut next = vec![T::zero(); n + 1];
    acc[0] = T::one();

    for (i, &root) in roots.iter().enumerate() {
        // acc currently holds a degree-i polynomial; multiply it by (x - root).
        for j in 0..=i + 1 {
            let shifted = if j > 0 { acc[j - 1] } else { T::zero() };
            let scaled = if j <= i { acc[j] * root } else { T::zero() };
            next[j] = shifted - scaled;
        }
        core::mem::swap(&mut acc, &mut next);
    }
    acc
}
