//! Shared numeric helpers for the `cwfilter` crates.
//!
//! The [`num_rs`] module mirrors the small subset of `numpy` routines the filter and
//! sine-subtraction engines lean on: polynomial expansion from roots and phase unwrapping.

#![deny(missing_docs)]

mod error;

/// Numpy-like numeric routines.
pub mod num_rs;

pub use error::{Error, Result};
