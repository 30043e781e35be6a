use core::fmt;

/// Errors raised by low-level numeric routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Argument passed into a function was invalid.
    InvalidArg {
        /// The invalid arg.
        arg: String,
        /// Explaining why arg is invalid.
        reason: String,
    },
    /// The inputs are valid on their own but land on a mathematical singularity.
    Domain {
        /// Which singularity was hit.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArg { arg, reason } => write!(f, "Invalid argument `{arg}`: {reason}"),
            Error::Domain { reason } => write!(f, "Domain error: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used across `cwfilter-core`.
pub type Result<T> = core::result::Result<T, Error>;
