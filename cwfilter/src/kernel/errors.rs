use core::fmt;

/// Rejected configuration: a filter, design or engine config that cannot be built, or a
/// buffer that cannot be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Coefficient list or other required sequence is empty.
    EmptyInput {
        /// Offending argument.
        arg: &'static str,
    },
    /// A config field is out of range.
    InvalidArgument {
        /// Offending argument.
        arg: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
    /// An `ndarray` buffer is strided and has no slice view.
    NonContiguous {
        /// Offending argument.
        arg: &'static str,
    },
    /// Paired sequences (for example trace abscissae and ordinates) differ in length.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyInput { arg } => write!(f, "`{arg}` must not be empty"),
            ConfigError::InvalidArgument { arg, reason } => {
                write!(f, "bad `{arg}`: {reason}")
            }
            ConfigError::NonContiguous { arg } => {
                write!(f, "`{arg}` has no contiguous slice view")
            }
            ConfigError::LengthMismatch { arg, expected, got } => {
                write!(f, "`{arg}` holds {got} samples, expected {expected}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure while running a validated filter or engine on concrete data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInvariantViolation {
    /// The data handed to a run cannot be processed (too short, wrong spacing, no usable
    /// bin, ...).
    InvalidState {
        /// Human readable reason.
        reason: &'static str,
    },
    /// An output buffer or sibling trace has the wrong length.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// A buffer or derived config was rejected while running.
    Config(ConfigError),
    /// A numeric routine hit an invalid argument or a singularity.
    Numeric(cwfilter_core::Error),
}

impl From<ConfigError> for ExecInvariantViolation {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<cwfilter_core::Error> for ExecInvariantViolation {
    fn from(value: cwfilter_core::Error) -> Self {
        Self::Numeric(value)
    }
}

impl fmt::Display for ExecInvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecInvariantViolation::InvalidState { reason } => {
                write!(f, "cannot run: {reason}")
            }
            ExecInvariantViolation::LengthMismatch { arg, expected, got } => {
                write!(f, "`{arg}` holds {got} samples at run time, expected {expected}")
            }
            ExecInvariantViolation::Config(err) => write!(f, "{err}"),
            ExecInvariantViolation::Numeric(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ExecInvariantViolation {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecInvariantViolation::Config(err) => Some(err),
            ExecInvariantViolation::Numeric(err) => Some(err),
            _ => None,
        }
    }
}
