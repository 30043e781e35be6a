//! Analog pole-zero-gain prototypes and their conversion to digital IIR coefficients.
//!
//! The pipeline is prototype ([`Zpk::rc`], [`Zpk::butterworth`], [`Zpk::chebyshev1`]) then
//! [`Zpk::transform`] to the requested topology and cutoff, then [`Zpk::bilinear`] into the
//! z-domain, and finally [`DigitalZpk::to_ba`] for the difference-equation coefficients.
//!
//! Frequencies are normalized to Nyquist: `w = 1` is half the sample rate. The analog
//! cutoffs are prewarped with `tan(pi * w / 2)` so the digital filter hits `w` exactly.

use cwfilter_core::num_rs::poly;
use cwfilter_core::{Error, Result};
use nalgebra::Complex;
use tracing::warn;

mod kernels;

pub use kernels::*;

/// Imaginary gain residue tolerated after the bilinear transform before a warning is logged.
const GAIN_IMAG_TOLERANCE: f64 = 1e-8;

/// Frequency-response shape of a designed filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTopology {
    /// Pass below the cutoff.
    Lowpass,
    /// Pass above the cutoff.
    Highpass,
    /// Pass `w ± dw`.
    Bandpass,
    /// Reject `w ± dw`.
    Notch,
}

impl FilterTopology {
    /// Whether the topology needs a bandwidth.
    pub fn is_band(self) -> bool {
        matches!(self, FilterTopology::Bandpass | FilterTopology::Notch)
    }
}

/// Analog prototype family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prototype {
    /// Single pole at `-1`.
    Rc,
    /// Maximally flat pass band.
    Butterworth {
        /// Number of analog poles.
        order: usize,
    },
    /// Equiripple pass band.
    ChebyshevI {
        /// Number of analog poles.
        order: usize,
        /// Peak-to-peak pass-band ripple in dB. Must be positive.
        ripple_db: f64,
    },
}

/// Analog (s-domain) zeros, poles and gain.
#[derive(Debug, Clone, PartialEq)]
pub struct Zpk {
    /// Zeros.
    pub zeros: Vec<Complex<f64>>,
    /// Poles.
    pub poles: Vec<Complex<f64>>,
    /// Real gain.
    pub gain: f64,
    /// Prototype order.
    pub order: usize,
}

/// Digital (z-domain) zeros, poles and gain. Both root lists have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalZpk {
    /// Zeros.
    pub zeros: Vec<Complex<f64>>,
    /// Poles.
    pub poles: Vec<Complex<f64>>,
    /// Real gain.
    pub gain: f64,
}

fn product_of_negated(roots: &[Complex<f64>]) -> Complex<f64> {
    roots
        .iter()
        .fold(Complex::new(1.0, 0.0), |acc, r| acc * (-*r))
}

impl Zpk {
    /// First order RC lowpass prototype.
    pub fn rc() -> Self {
        Self {
            zeros: Vec::new(),
            poles: vec![Complex::new(-1.0, 0.0)],
            gain: 1.0,
            order: 1,
        }
    }

    /// Butterworth prototype: `order` poles evenly spaced on the left half of the unit circle.
    pub fn butterworth(order: usize) -> Self {
        let n = order as f64;
        let poles: Vec<Complex<f64>> = (1..=order)
            .map(|k| {
                let theta = core::f64::consts::PI * (2.0 * k as f64 + n - 1.0) / (2.0 * n);
                Complex::new(0.0, theta).exp()
            })
            .collect();
        let gain = 1.0 / product_of_negated(&poles).re;
        Self {
            zeros: Vec::new(),
            poles,
            gain,
            order,
        }
    }

    /// Chebyshev type I prototype with `ripple_db` of pass-band ripple.
    ///
    /// Even orders are normalized so the ripple hangs below unity gain, which leaves the DC
    /// gain at `10^(-ripple_db / 20)`.
    pub fn chebyshev1(order: usize, ripple_db: f64) -> Self {
        let n = order as f64;
        let eps = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
        let v0 = (1.0 / eps).asinh() / n;
        let (sv0, cv0) = (v0.sinh(), v0.cosh());
        let poles: Vec<Complex<f64>> = (1..=order)
            .map(|k| {
                let theta = core::f64::consts::PI * (2.0 * k as f64 - 1.0) / (2.0 * n);
                Complex::new(-sv0 * theta.sin(), cv0 * theta.cos())
            })
            .collect();
        let mut gain = product_of_negated(&poles).re;
        if order % 2 == 0 {
            gain /= 10f64.powf(ripple_db / 20.0);
        }
        Self {
            zeros: Vec::new(),
            poles,
            gain,
            order,
        }
    }

    /// Build the prototype described by `prototype`.
    pub fn from_prototype(prototype: Prototype) -> Self {
        match prototype {
            Prototype::Rc => Self::rc(),
            Prototype::Butterworth { order } => Self::butterworth(order),
            Prototype::ChebyshevI { order, ripple_db } => Self::chebyshev1(order, ripple_db),
        }
    }

    /// Map the unit-cutoff lowpass prototype onto `topology` at normalized frequency `w`.
    ///
    /// `dw` is the half bandwidth for [`FilterTopology::Bandpass`] and
    /// [`FilterTopology::Notch`] and is ignored otherwise.
    pub fn transform(&self, topology: FilterTopology, w: f64, dw: f64) -> Result<Zpk> {
        use core::f64::consts::PI;

        if !(w > 0.0 && w < 1.0) {
            return Err(Error::InvalidArg {
                arg: "w".into(),
                reason: format!("normalized cutoff must lie in (0, 1), got {w}"),
            });
        }
        if topology.is_band() && (dw == 0.0 || !dw.is_finite()) {
            return Err(Error::InvalidArg {
                arg: "dw".into(),
                reason: "band topologies need a nonzero finite bandwidth".into(),
            });
        }

        let big_w = (PI * w / 2.0).tan();
        let wh = (PI * (w + dw) / 2.0).tan();
        let wl = (PI * (w - dw) / 2.0).tan();
        let big_dw = (wh - wl) / 2.0;

        let mut gain = Complex::new(self.gain, 0.0);
        let mut zeros = Vec::new();
        let mut poles = Vec::new();
        let zero = Complex::new(0.0, 0.0);

        match topology {
            FilterTopology::Lowpass => {
                for z in &self.zeros {
                    zeros.push(*z * big_w);
                    gain /= big_w;
                }
                for p in &self.poles {
                    poles.push(*p * big_w);
                    gain *= big_w;
                }
            }
            FilterTopology::Highpass => {
                for z in &self.zeros {
                    zeros.push(Complex::new(big_w, 0.0) / *z);
                    gain *= -*z;
                }
                zeros.extend((self.zeros.len()..self.poles.len()).map(|_| zero));
                for p in &self.poles {
                    poles.push(Complex::new(big_w, 0.0) / *p);
                    gain *= -p.inv();
                }
                poles.extend((self.poles.len()..self.zeros.len()).map(|_| zero));
            }
            FilterTopology::Bandpass => {
                let split = |r: &Complex<f64>| {
                    let b = *r * big_dw;
                    let x = (b * b - wh * wl).sqrt();
                    [b + x, b - x]
                };
                for z in &self.zeros {
                    zeros.extend(split(z));
                    gain /= 2.0 * big_dw;
                }
                zeros.extend((self.zeros.len()..self.poles.len()).map(|_| zero));
                for p in &self.poles {
                    poles.extend(split(p));
                    gain *= 2.0 * big_dw;
                }
                poles.extend((self.poles.len()..self.zeros.len()).map(|_| zero));
            }
            FilterTopology::Notch => {
                let extra = Complex::new(-wh * wl, 0.0).sqrt();
                let split = |r: &Complex<f64>| {
                    let b = Complex::new(big_dw, 0.0) / *r;
                    let x = (b * b - wh * wl).sqrt();
                    [b + x, b - x]
                };
                for z in &self.zeros {
                    zeros.extend(split(z));
                    gain *= -*z;
                }
                for _ in self.zeros.len()..self.poles.len() {
                    zeros.extend([extra, -extra]);
                }
                for p in &self.poles {
                    poles.extend(split(p));
                    gain *= -p.inv();
                }
                for _ in self.poles.len()..self.zeros.len() {
                    poles.extend([extra, -extra]);
                }
            }
        }

        Ok(Zpk {
            zeros,
            poles,
            gain: gain.re,
            order: self.order,
        })
    }

    /// Bilinear transform `z = (1 + s) / (1 - s)`.
    ///
    /// Both digital root lists get `max(#poles, #zeros)` entries; roots missing on the
    /// shorter side are placed at `z = -1`. A root at exactly `s = 1` has no finite image
    /// and is reported as a domain error.
    pub fn bilinear(&self) -> Result<DigitalZpk> {
        let n = self.poles.len().max(self.zeros.len());
        let one = Complex::new(1.0, 0.0);
        let minus_one = Complex::new(-1.0, 0.0);

        let map = |r: &Complex<f64>| -> Result<Complex<f64>> {
            if *r == one {
                return Err(Error::Domain {
                    reason: "analog root at s = 1 maps to infinity".into(),
                });
            }
            Ok((one + *r) / (one - *r))
        };

        let mut gain = Complex::new(self.gain, 0.0);
        let mut zeros = Vec::with_capacity(n);
        let mut poles = Vec::with_capacity(n);
        for i in 0..n {
            match self.zeros.get(i) {
                Some(z) => {
                    zeros.push(map(z)?);
                    gain *= one - *z;
                }
                None => zeros.push(minus_one),
            }
            match self.poles.get(i) {
                Some(p) => {
                    poles.push(map(p)?);
                    gain /= one - *p;
                }
                None => poles.push(minus_one),
            }
        }

        if gain.im.abs() > GAIN_IMAG_TOLERANCE * gain.re.abs().max(1.0) {
            warn!(
                imag = gain.im,
                real = gain.re,
                "bilinear gain kept an imaginary part, discarding it"
            );
        }

        Ok(DigitalZpk {
            zeros,
            poles,
            gain: gain.re,
        })
    }
}

impl DigitalZpk {
    /// Feedforward `b` and feedback `a` coefficients, index 0 multiplying `z^0`.
    pub fn to_ba(&self) -> (Vec<f64>, Vec<f64>) {
        let gain = Complex::new(self.gain, 0.0);
        let b = poly(&self.zeros)
            .into_iter()
            .rev()
            .map(|c| (gain * c).re)
            .collect();
        let a = poly(&self.poles).into_iter().rev().map(|c| c.re).collect();
        (b, a)
    }
}
