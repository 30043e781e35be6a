//! Trait-first kernel for analog-prototype IIR design.

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle};
use crate::signal::filter::IirFilter;
use crate::signal::traits::{DigitalFilter, IirDesign};
use nalgebra::Complex;
use tracing::debug;

use super::{DigitalZpk, FilterTopology, Prototype, Zpk};

/// Constructor config for [`IirDesignKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IirDesignConfig {
    /// Analog prototype and its parameters.
    pub prototype: Prototype,
    /// Response shape.
    pub topology: FilterTopology,
    /// Cutoff (or band center), normalized to Nyquist.
    pub w: f64,
    /// Half bandwidth for band topologies, normalized to Nyquist. Ignored otherwise.
    pub dw: f64,
}

/// Trait-first IIR design kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IirDesignKernel {
    prototype: Prototype,
    topology: FilterTopology,
    w: f64,
    dw: f64,
}

impl KernelLifecycle for IirDesignKernel {
    type Config = IirDesignConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        match config.prototype {
            Prototype::Rc => {}
            Prototype::Butterworth { order } => {
                if order == 0 {
                    return Err(ConfigError::InvalidArgument {
                        arg: "order",
                        reason: "order must be greater than zero",
                    });
                }
            }
            Prototype::ChebyshevI { order, ripple_db } => {
                if order == 0 {
                    return Err(ConfigError::InvalidArgument {
                        arg: "order",
                        reason: "order must be greater than zero",
                    });
                }
                if !(ripple_db > 0.0) || !ripple_db.is_finite() {
                    return Err(ConfigError::InvalidArgument {
                        arg: "ripple_db",
                        reason: "ripple must be positive and finite",
                    });
                }
            }
        }

        if !(config.w > 0.0 && config.w < 1.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "w",
                reason: "normalized cutoff must satisfy 0 < w < 1",
            });
        }
        if config.topology.is_band() {
            if config.dw == 0.0 || !config.dw.is_finite() {
                return Err(ConfigError::InvalidArgument {
                    arg: "dw",
                    reason: "band topologies need a nonzero bandwidth",
                });
            }
            let (lo, hi) = (config.w - config.dw.abs(), config.w + config.dw.abs());
            if !(lo > 0.0 && hi < 1.0) {
                return Err(ConfigError::InvalidArgument {
                    arg: "dw",
                    reason: "band edges w - dw and w + dw must lie inside (0, 1)",
                });
            }
        }

        Ok(Self {
            prototype: config.prototype,
            topology: config.topology,
            w: config.w,
            dw: config.dw,
        })
    }
}

impl IirDesign for IirDesignKernel {
    fn run_alloc(&self) -> Result<ZpkIirFilter, ExecInvariantViolation> {
        let prototype = Zpk::from_prototype(self.prototype);
        let analog = prototype.transform(self.topology, self.w, self.dw)?;
        let digital = analog.bilinear()?;
        let (b, a) = digital.to_ba();
        debug!(
            prototype = ?self.prototype,
            topology = ?self.topology,
            w = self.w,
            dw = self.dw,
            ntaps = b.len(),
            "designed iir filter"
        );
        let iir = IirFilter::try_new(b, a)?;
        Ok(ZpkIirFilter {
            analog,
            digital,
            iir,
        })
    }
}

/// An IIR filter designed from an analog prototype, keeping every intermediate form.
#[derive(Debug, Clone, PartialEq)]
pub struct ZpkIirFilter {
    analog: Zpk,
    digital: DigitalZpk,
    iir: IirFilter,
}

impl ZpkIirFilter {
    /// Validate `config` and run the design.
    pub fn design(config: IirDesignConfig) -> Result<Self, ExecInvariantViolation> {
        IirDesignKernel::try_new(config)?.run_alloc()
    }

    /// First order RC filter.
    pub fn rc(topology: FilterTopology, w: f64, dw: f64) -> Result<Self, ExecInvariantViolation> {
        Self::design(IirDesignConfig {
            prototype: Prototype::Rc,
            topology,
            w,
            dw,
        })
    }

    /// Butterworth filter of the given prototype order.
    pub fn butterworth(
        topology: FilterTopology,
        order: usize,
        w: f64,
        dw: f64,
    ) -> Result<Self, ExecInvariantViolation> {
        Self::design(IirDesignConfig {
            prototype: Prototype::Butterworth { order },
            topology,
            w,
            dw,
        })
    }

    /// Chebyshev type I filter with `ripple_db` of pass-band ripple.
    pub fn chebyshev1(
        topology: FilterTopology,
        order: usize,
        ripple_db: f64,
        w: f64,
        dw: f64,
    ) -> Result<Self, ExecInvariantViolation> {
        Self::design(IirDesignConfig {
            prototype: Prototype::ChebyshevI { order, ripple_db },
            topology,
            w,
            dw,
        })
    }

    /// Transformed analog zeros, poles and gain.
    pub fn analog(&self) -> &Zpk {
        &self.analog
    }

    /// Digital zeros, poles and gain.
    pub fn digital(&self) -> &DigitalZpk {
        &self.digital
    }

    /// The difference-equation form.
    pub fn iir(&self) -> &IirFilter {
        &self.iir
    }

    /// Prototype order.
    pub fn order(&self) -> usize {
        self.analog.order
    }
}

impl DigitalFilter for ZpkIirFilter {
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        self.iir.filter_into(input, out)
    }

    fn transfer(&self, z: Complex<f64>) -> Complex<f64> {
        self.iir.transfer(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DC: Complex<f64> = Complex::new(1.0, 0.0);
    const NYQUIST: Complex<f64> = Complex::new(-1.0, 0.0);

    #[test]
    fn kernel_rejects_invalid_configs() {
        let base = IirDesignConfig {
            prototype: Prototype::Butterworth { order: 2 },
            topology: FilterTopology::Lowpass,
            w: 0.3,
            dw: 0.0,
        };
        assert!(IirDesignKernel::try_new(base).is_ok());

        let err = IirDesignKernel::try_new(IirDesignConfig {
            prototype: Prototype::Butterworth { order: 0 },
            ..base
        })
        .expect_err("zero order");
        assert_eq!(
            err,
            ConfigError::InvalidArgument {
                arg: "order",
                reason: "order must be greater than zero",
            }
        );

        let err = IirDesignKernel::try_new(IirDesignConfig { w: 1.0, ..base }).expect_err("w");
        assert!(matches!(err, ConfigError::InvalidArgument { arg: "w", .. }));

        let err = IirDesignKernel::try_new(IirDesignConfig {
            topology: FilterTopology::Bandpass,
            ..base
        })
        .expect_err("missing dw");
        assert!(matches!(err, ConfigError::InvalidArgument { arg: "dw", .. }));

        let err = IirDesignKernel::try_new(IirDesignConfig {
            topology: FilterTopology::Notch,
            w: 0.9,
            dw: 0.2,
            ..base
        })
        .expect_err("band edge past nyquist");
        assert!(matches!(err, ConfigError::InvalidArgument { arg: "dw", .. }));

        let err = IirDesignKernel::try_new(IirDesignConfig {
            prototype: Prototype::ChebyshevI {
                order: 3,
                ripple_db: 0.0,
            },
            ..base
        })
        .expect_err("ripple");
        assert!(matches!(
            err,
            ConfigError::InvalidArgument {
                arg: "ripple_db",
                ..
            }
        ));
    }

    #[test]
    fn pole_only_prototypes_hit_closed_form_dc_gain() {
        let cases = [
            (ZpkIirFilter::rc(FilterTopology::Lowpass, 0.2, 0.0), 1.0),
            (
                ZpkIirFilter::butterworth(FilterTopology::Lowpass, 5, 0.1, 0.0),
                1.0,
            ),
            (
                ZpkIirFilter::chebyshev1(FilterTopology::Lowpass, 4, 1.0, 0.4, 0.0),
                10f64.powf(-1.0 / 20.0),
            ),
            (
                ZpkIirFilter::chebyshev1(FilterTopology::Lowpass, 3, 1.0, 0.4, 0.0),
                1.0,
            ),
            (
                ZpkIirFilter::butterworth(FilterTopology::Highpass, 3, 0.3, 0.0),
                0.0,
            ),
            (
                ZpkIirFilter::butterworth(FilterTopology::Bandpass, 2, 0.4, 0.05),
                0.0,
            ),
            (ZpkIirFilter::rc(FilterTopology::Notch, 0.5, 0.1), 1.0),
        ];
        for (filt, expected) in cases {
            let filt = filt.expect("design");
            assert_abs_diff_eq!(filt.transfer(DC).norm(), expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn highpass_passes_nyquist() {
        let filt = ZpkIirFilter::chebyshev1(FilterTopology::Highpass, 3, 0.5, 0.5, 0.0)
            .expect("design");
        assert_abs_diff_eq!(filt.transfer(NYQUIST).norm(), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn lowpass_settles_to_unit_step() {
        let filt =
            ZpkIirFilter::butterworth(FilterTopology::Lowpass, 4, 0.2, 0.0).expect("design");
        let y = filt.filter_alloc(&vec![1.0; 400]).expect("filter");
        assert_abs_diff_eq!(y[399], 1.0, epsilon = 1e-6);
        assert_eq!(filt.order(), 4);
        assert_eq!(filt.digital().poles.len(), 4);
        assert_eq!(filt.iir().a().len(), 5);
    }

    #[test]
    fn run_alloc_through_the_capability_trait() {
        let kernel = IirDesignKernel::try_new(IirDesignConfig {
            prototype: Prototype::Rc,
            topology: FilterTopology::Highpass,
            w: 0.25,
            dw: 0.0,
        })
        .expect("kernel");
        let filt = kernel.run_alloc().expect("design");
        assert_eq!(filt.iir().b().len(), 2);
        assert_abs_diff_eq!(filt.transfer(DC).norm(), 0.0, epsilon = 1e-12);
    }
}
