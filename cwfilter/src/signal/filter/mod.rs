//! Digital filters: analog-prototype IIR design, FIR kernels, series composition and
//! frequency response diagnostics.
//!
//! Every filter implements [`DigitalFilter`](crate::signal::traits::DigitalFilter), which
//! works on whole finite sequences (no streaming state is carried between calls).

/// Analog ZPK prototypes, frequency transforms and the bilinear transform.
pub mod design;

mod fir;
mod iir;
mod response;
mod savgol;
mod series;

pub use fir::*;
pub use iir::*;
pub use response::*;
pub use series::*;
