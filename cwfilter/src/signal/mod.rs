/// Filter design, application and frequency response.
pub mod filter;

/// Sinusoid fitting and continuous-wave subtraction.
pub mod sine;

/// Real FFT capability backed by `rustfft`.
pub mod spectral;

/// Interpolation onto a uniform grid.
pub mod resample;

/// Capability traits.
pub mod traits;

/// Tapering windows.
pub mod windows;
