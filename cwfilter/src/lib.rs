#![deny(missing_docs)]
//! Digital filter design and continuous-wave interference removal for sampled series.
//!
//! * [`signal::filter`] designs IIR filters from analog pole-zero-gain prototypes, builds FIR
//!   kernels (windowed sinc, Savitzky-Golay, Gaussian, box, finite difference), chains them
//!   in series, and reports amplitude, phase and group-delay curves.
//! * [`signal::sine`] fits sinusoids jointly across several time-aligned traces and removes
//!   them one at a time while each removal keeps paying for itself in power.
//!
//! FFT, interpolation, windowing and bounded minimization are reached through capability
//! traits in [`signal::traits`] and [`optim`], with `rustfft` and `argmin` backed defaults.

/// Constructor validation, error types and buffer adapters shared by every engine.
pub mod kernel;

/// Bounded minimization capability.
pub mod optim;

/// Signal processing.
pub mod signal;

/// Small statistics helpers.
pub mod stats;

pub use cwfilter_core::{Error, Result};
