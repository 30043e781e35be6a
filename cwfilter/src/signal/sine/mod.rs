//! Sinusoid fitting and iterative continuous-wave (CW) subtraction.
//!
//! [`SineFitter`] fits one sinusoid with a shared frequency to several traces.
//! [`SineSubtract`] repeatedly locates the strongest spectral peak, fits it, and removes it
//! while doing so still lowers the residual power.

mod fitter;
mod result;
mod subtract;

pub use fitter::*;
pub use result::*;
pub use subtract::*;
