use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Every engine in this crate is built from a plain config struct. `try_new` checks the
/// config once, so run-time entry points only have to validate the data they are handed.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, KernelLifecycle};
    use crate::signal::filter::design::{FilterTopology, IirDesignConfig, IirDesignKernel, Prototype};
    use crate::signal::sine::{SineSubtract, SineSubtractConfig};

    fn rejected_arg<K: KernelLifecycle>(config: K::Config) -> Option<&'static str> {
        match K::try_new(config) {
            Err(ConfigError::InvalidArgument { arg, .. }) => Some(arg),
            _ => None,
        }
    }

    #[test]
    fn design_and_engine_configs_share_the_constructor() {
        let design = IirDesignConfig {
            prototype: Prototype::ChebyshevI {
                order: 4,
                ripple_db: 0.5,
            },
            topology: FilterTopology::Bandpass,
            w: 0.3,
            dw: 0.05,
        };
        assert!(IirDesignKernel::try_new(design).is_ok());
        assert_eq!(
            rejected_arg::<IirDesignKernel>(IirDesignConfig { w: 0.0, ..design }),
            Some("w")
        );

        assert!(<SineSubtract as KernelLifecycle>::try_new(SineSubtractConfig::default()).is_ok());
        assert_eq!(
            rejected_arg::<SineSubtract>(SineSubtractConfig {
                neighbor_factor: -1.0,
                ..Default::default()
            }),
            Some("neighbor_factor")
        );
    }
}
