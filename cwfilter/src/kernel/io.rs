use super::ConfigError;

use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// Read access to a contiguous run of samples, so filters accept slices, vectors and
/// `ndarray` buffers alike.
pub trait Read1D<T> {
    /// The samples as one slice.
    fn read_slice(&self) -> Result<&[T], ConfigError>;
}

/// Write access to a contiguous run of output samples.
pub trait Write1D<T> {
    /// The output as one mutable slice.
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError>;
}

macro_rules! contiguous {
    ($($ty:ty => [$($gen:tt)*]),* $(,)?) => {$(
        impl<T, $($gen)*> Read1D<T> for $ty {
            fn read_slice(&self) -> Result<&[T], ConfigError> {
                Ok(&self[..])
            }
        }

        impl<T, $($gen)*> Write1D<T> for $ty {
            fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
                Ok(&mut self[..])
            }
        }
    )*};
}

contiguous!([T] => [], Vec<T> => [], [T; N] => [const N: usize]);

impl<T> Read1D<T> for Array1<T> {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        self.as_slice()
            .ok_or(ConfigError::NonContiguous { arg: "input" })
    }
}

impl<T> Write1D<T> for Array1<T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut()
            .ok_or(ConfigError::NonContiguous { arg: "out" })
    }
}

impl<T> Read1D<T> for ArrayView1<'_, T> {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        self.as_slice()
            .ok_or(ConfigError::NonContiguous { arg: "input" })
    }
}

impl<T> Write1D<T> for ArrayViewMut1<'_, T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut()
            .ok_or(ConfigError::NonContiguous { arg: "out" })
    }
}

/// A caller-owned sampled series: abscissa `x` and ordinate `y` of equal length.
///
/// The sine subtraction engine reads `x` and rewrites `y` in place, so implementors must
/// be able to hand out both at once through [`Trace::xy_mut`].
pub trait Trace {
    /// Sample positions.
    fn x(&self) -> &[f64];
    /// Sample values.
    fn y(&self) -> &[f64];
    /// Borrow positions immutably and values mutably at the same time.
    fn xy_mut(&mut self) -> (&[f64], &mut [f64]);

    /// Mutable sample values.
    fn y_mut(&mut self) -> &mut [f64] {
        self.xy_mut().1
    }

    /// Number of samples in `y`.
    fn len(&self) -> usize {
        self.y().len()
    }

    /// Whether the trace holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned (x, y) trace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceBuf {
    /// Sample positions.
    pub x: Vec<f64>,
    /// Sample values.
    pub y: Vec<f64>,
}

impl TraceBuf {
    /// Pair explicit positions with values. Lengths must agree.
    pub fn try_new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ConfigError> {
        if x.len() != y.len() {
            return Err(ConfigError::LengthMismatch {
                arg: "y",
                expected: x.len(),
                got: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    /// Uniformly sampled trace with `x[i] = i * dt`.
    pub fn uniform(dt: f64, y: Vec<f64>) -> Self {
        let x = (0..y.len()).map(|i| i as f64 * dt).collect();
        Self { x, y }
    }
}

impl Trace for TraceBuf {
    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }

    fn xy_mut(&mut self) -> (&[f64], &mut [f64]) {
        (&self.x, &mut self.y)
    }
}

impl<T: Trace + ?Sized> Trace for &mut T {
    fn x(&self) -> &[f64] {
        (**self).x()
    }

    fn y(&self) -> &[f64] {
        (**self).y()
    }

    fn xy_mut(&mut self) -> (&[f64], &mut [f64]) {
        (**self).xy_mut()
    }
}
