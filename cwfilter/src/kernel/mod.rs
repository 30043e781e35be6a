//! Shared trait-first kernel substrate.
//!
//! Constructor validation ([`KernelLifecycle`]), the config/execution error split, 1D
//! buffer adapters and the caller-owned [`Trace`] abstraction used by the filter and
//! sine-subtraction engines.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
