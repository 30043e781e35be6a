//! Iterative continuous-wave removal.

use std::collections::BTreeMap;

use nalgebra::Complex;
use tracing::{debug, trace};

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Trace, TraceBuf};
use crate::optim::{BoundedMinimizer, LbfgsMinimizer, Verbosity};
use crate::signal::resample::Linear;
use crate::signal::spectral::{rfft_frequencies, RustFft};
use crate::signal::traits::{Interpolate, RealFft, Window};
use crate::signal::windows::WindowShape;
use crate::stats::{mean_square, remove_mean};

use super::{SineComponent, SineFitter, SineGuess, SineSubtractResult, Snapshots};

/// Constructor config for [`SineSubtract`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineSubtractConfig {
    /// Consecutive rejected fits tolerated before giving up.
    pub maxiter: usize,
    /// Smallest fractional power reduction for a fit to be accepted.
    pub min_power_reduction: f64,
    /// A bin is a peak candidate when its power times this factor exceeds both neighbors.
    pub neighbor_factor: f64,
    /// First sample used for spectra and fits.
    pub tmin: Option<usize>,
    /// One past the last sample used for spectra and fits.
    pub tmax: Option<usize>,
    /// Lowest frequency searched.
    pub fmin: Option<f64>,
    /// Highest frequency searched.
    pub fmax: Option<f64>,
    /// Keep [`Snapshots`] of every stage.
    pub store: bool,
    /// Minimizer reporting level.
    pub verbosity: Verbosity,
    /// Window applied before each spectrum.
    pub window: Option<WindowShape>,
}

impl Default for SineSubtractConfig {
    fn default() -> Self {
        Self {
            maxiter: 3,
            min_power_reduction: 0.05,
            neighbor_factor: 1.0,
            tmin: None,
            tmax: None,
            fmin: None,
            fmax: None,
            store: false,
            verbosity: Verbosity::Quiet,
            window: None,
        }
    }
}

/// Removes the strongest sinusoids from a set of traces, one at a time.
///
/// Each iteration takes the aggregate power spectrum of every trace, seeds a joint fit at
/// the most prominent peak, and subtracts the fitted sinusoid from the full traces when it
/// lowers the mean power by at least `min_power_reduction`. Rejected peaks are down-weighted
/// so the search moves on; the run stops after `maxiter + 1` consecutive rejections.
///
/// ```
/// use core::f64::consts::PI;
/// use cwfilter::kernel::{KernelLifecycle, TraceBuf};
/// use cwfilter::signal::sine::{SineSubtract, SineSubtractConfig};
///
/// let y: Vec<f64> = (0..256)
///     .map(|i| 2.0 * (2.0 * PI * 0.125 * i as f64 + 0.3).sin())
///     .collect();
/// let mut traces = vec![TraceBuf::uniform(1.0, y)];
///
/// let mut cw: SineSubtract = SineSubtract::try_new(SineSubtractConfig::default()).unwrap();
/// let result = cw.subtract_cw(&mut traces, None).unwrap();
/// assert!(!result.is_empty());
/// assert!((result.components[0].freq - 0.125).abs() < 1e-4);
/// assert!(traces[0].y.iter().all(|v| v.abs() < 1e-2));
/// ```
pub struct SineSubtract<M: BoundedMinimizer = LbfgsMinimizer> {
    maxiter: usize,
    min_power_reduction: f64,
    neighbor_factor: f64,
    tmin: Option<usize>,
    tmax: Option<usize>,
    fmin: Option<f64>,
    fmax: Option<f64>,
    store: bool,
    window: Option<Box<dyn Window>>,
    fft: Box<dyn RealFft>,
    interpolator: Box<dyn Interpolate>,
    fitter: SineFitter<M>,
    result: SineSubtractResult,
    snapshots: Snapshots,
}

impl<M: BoundedMinimizer + Default> KernelLifecycle for SineSubtract<M> {
    type Config = SineSubtractConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !config.min_power_reduction.is_finite() || config.min_power_reduction <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "min_power_reduction",
                reason: "threshold must be positive and finite",
            });
        }
        if !config.neighbor_factor.is_finite() || config.neighbor_factor <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "neighbor_factor",
                reason: "neighbor factor must be positive and finite",
            });
        }
        if let (Some(lo), Some(hi)) = (config.tmin, config.tmax) {
            if lo >= hi {
                return Err(ConfigError::InvalidArgument {
                    arg: "tmax",
                    reason: "sample range must satisfy tmin < tmax",
                });
            }
        }
        for (arg, f) in [("fmin", config.fmin), ("fmax", config.fmax)] {
            if f.is_some_and(|f| !f.is_finite() || f < 0.0) {
                return Err(ConfigError::InvalidArgument {
                    arg,
                    reason: "frequency limits must be finite and non-negative",
                });
            }
        }
        if let (Some(lo), Some(hi)) = (config.fmin, config.fmax) {
            if lo >= hi {
                return Err(ConfigError::InvalidArgument {
                    arg: "fmax",
                    reason: "frequency range must satisfy fmin < fmax",
                });
            }
        }

        Ok(Self {
            maxiter: config.maxiter,
            min_power_reduction: config.min_power_reduction,
            neighbor_factor: config.neighbor_factor,
            tmin: config.tmin,
            tmax: config.tmax,
            fmin: config.fmin,
            fmax: config.fmax,
            store: config.store,
            window: config
                .window
                .map(|shape| Box::new(shape) as Box<dyn Window>),
            fft: Box::new(RustFft::new()),
            interpolator: Box::new(Linear),
            fitter: SineFitter::new(M::default()).with_verbosity(config.verbosity),
            result: SineSubtractResult::new(),
            snapshots: Snapshots::default(),
        })
    }
}

/// Spectra of one iteration.
struct Spectrum {
    nfft: usize,
    dt: f64,
    bins: Vec<Vec<Complex<f64>>>,
    power: Vec<f64>,
}

impl<M: BoundedMinimizer> SineSubtract<M> {
    /// Replace the spectral window with a custom one.
    pub fn with_window(mut self, window: Box<dyn Window>) -> Self {
        self.window = Some(window);
        self
    }

    /// Replace the FFT backend.
    pub fn with_fft(mut self, fft: Box<dyn RealFft>) -> Self {
        self.fft = fft;
        self
    }

    /// Replace the interpolator used when resampling to a uniform `dt`.
    pub fn with_interpolator(mut self, interpolator: Box<dyn Interpolate>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Log of the last run.
    pub fn result(&self) -> &SineSubtractResult {
        &self.result
    }

    /// Diagnostics of the last run, when storage is enabled.
    pub fn snapshots(&self) -> Option<&Snapshots> {
        self.store.then_some(&self.snapshots)
    }

    /// Forget the last run.
    pub fn reset(&mut self) {
        self.result.clear();
        self.snapshots.clear();
    }

    /// Remove continuous-wave components from `traces` in place.
    ///
    /// ## Parameters
    /// * `traces`: one or more traces of equal length. Each is made zero-mean first; the
    ///   mean comes from the whole trace and is removed from every sample, including those
    ///   outside `[tmin, tmax)`.
    /// * `dt`: resample every trace to this uniform spacing before taking spectra. When
    ///   `None` the samples are assumed uniform with the spacing of the first two.
    ///
    /// Fits always use the cropped, unresampled samples, and the fitted sinusoid is
    /// subtracted from every sample of every trace. Input and configuration errors are
    /// reported before any trace is modified.
    pub fn subtract_cw<T: Trace>(
        &mut self,
        traces: &mut [T],
        dt: Option<f64>,
    ) -> Result<&SineSubtractResult, ExecInvariantViolation> {
        self.reset();

        let Some(first) = traces.first() else {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "at least one trace is required",
            });
        };
        let n = first.len();
        for trace in traces.iter() {
            if trace.x().len() != n || trace.y().len() != n {
                return Err(ExecInvariantViolation::LengthMismatch {
                    arg: "traces",
                    expected: n,
                    got: trace.y().len().min(trace.x().len()),
                });
            }
        }
        let low = self.tmin.filter(|&t| t < n).unwrap_or(0);
        let high = self.tmax.filter(|&t| t > 0 && t <= n).unwrap_or(n);
        if high < low + 2 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "sample range must hold at least two samples",
            });
        }
        let spacing = match dt {
            Some(dt) if dt > 0.0 && dt.is_finite() => dt,
            Some(_) => {
                return Err(ExecInvariantViolation::InvalidState {
                    reason: "dt must be positive and finite",
                })
            }
            None => {
                let x = first.x();
                let dx = x[1] - x[0];
                if !(dx > 0.0) || !dx.is_finite() {
                    return Err(ExecInvariantViolation::InvalidState {
                        reason: "abscissae must be increasing",
                    });
                }
                dx
            }
        };

        let nfft = fft_len(self.segment_len(traces, low, high, dt)?);
        if self.first_bin_in_range(nfft, spacing).is_none() {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "frequency range excludes every spectrum bin",
            });
        }

        let nt = traces.len();
        let mut total = 0.0;
        for trace in traces.iter_mut() {
            remove_mean(trace.y_mut());
            let (p, _): (f64, usize) = mean_square(trace.y()[low..high].iter());
            total += p;
        }
        let initial_power = total / nt as f64;
        self.result.powers.push(initial_power);
        if self.store {
            self.snapshots.traces = traces.iter().map(|t| vec![t.y().to_vec()]).collect();
            self.snapshots.fft_phases = vec![Vec::new(); nt];
        }
        debug!(
            ntraces = nt,
            nsamples = n,
            low,
            high,
            initial_power,
            "starting cw subtraction"
        );

        let mut failed: BTreeMap<usize, usize> = BTreeMap::new();
        let mut consecutive = 0usize;
        loop {
            self.result.attempts += 1;
            let spectrum = self.spectrum(traces, low, high, dt, spacing)?;
            let bin = self.pick_bin(&spectrum, &failed)?;
            let freq = bin as f64 / (spectrum.dt * spectrum.nfft as f64);
            let guess = SineGuess {
                freq,
                phases: spectrum.bins.iter().map(|x| x[bin].arg()).collect(),
                amps: spectrum
                    .bins
                    .iter()
                    .map(|x| 2.0 * x[bin].norm() / spectrum.nfft as f64)
                    .collect(),
            };

            let last_power = self.result.powers.last().copied().unwrap_or(initial_power);
            let accepted = {
                let xs: Vec<&[f64]> = traces.iter().map(|t| &t.x()[low..high]).collect();
                let ys: Vec<&[f64]> = traces.iter().map(|t| &t.y()[low..high]).collect();
                match self.fitter.fit(&xs, &ys, &guess) {
                    Ok(component) => {
                        let ratio = 1.0 - component.power / last_power;
                        debug!(
                            bin,
                            freq = component.freq,
                            power = component.power,
                            ratio,
                            "fitted cw candidate"
                        );
                        (ratio >= self.min_power_reduction).then_some(component)
                    }
                    Err(err) => {
                        debug!(bin, freq, error = %err, "cw fit failed");
                        None
                    }
                }
            };

            match accepted {
                Some(component) => {
                    consecutive = 0;
                    self.accept(traces, component);
                    if self.store {
                        self.store_spectrum(&spectrum);
                        for (stages, trace) in self.snapshots.traces.iter_mut().zip(traces.iter()) {
                            stages.push(trace.y().to_vec());
                        }
                    }
                }
                None => {
                    *failed.entry(bin).or_insert(0) += 1;
                    self.result.failures += 1;
                    consecutive += 1;
                    trace!(bin, consecutive, "rejected cw candidate");
                    if consecutive > self.maxiter {
                        if self.store {
                            self.store_spectrum(&spectrum);
                        }
                        break;
                    }
                }
            }
        }

        debug!(
            removed = self.result.len(),
            attempts = self.result.attempts,
            final_power = self.result.final_power(),
            "finished cw subtraction"
        );
        Ok(&self.result)
    }

    /// Run [`SineSubtract::subtract_cw`] on a copy of `trace` and return the filtered copy.
    pub fn subtract_cw_copy<T: Trace + ?Sized>(
        &mut self,
        trace: &T,
        dt: Option<f64>,
    ) -> Result<TraceBuf, ExecInvariantViolation> {
        let mut copy = TraceBuf::try_new(trace.x().to_vec(), trace.y().to_vec())?;
        self.subtract_cw(core::slice::from_mut(&mut copy), dt)?;
        Ok(copy)
    }

    fn spectrum<T: Trace>(
        &mut self,
        traces: &[T],
        low: usize,
        high: usize,
        dt: Option<f64>,
        spacing: f64,
    ) -> Result<Spectrum, ExecInvariantViolation> {
        let mut segments = Vec::with_capacity(traces.len());
        for trace in traces {
            let x = &trace.x()[low..high];
            let y = &trace.y()[low..high];
            let mut segment = match dt {
                Some(dt) => self.interpolator.uniform(x, y, dt)?,
                None => y.to_vec(),
            };
            if let Some(window) = &self.window {
                window.apply(&mut segment);
            }
            segments.push(segment);
        }

        let nfft = fft_len(segments.iter().map(Vec::len).max().unwrap_or(0));
        let nbins = nfft / 2 + 1;
        let mut bins = Vec::with_capacity(segments.len());
        let mut power = vec![0.0; nbins];
        for segment in &segments {
            let spectrum = self.fft.rfft(segment, nfft)?;
            for (p, x) in power.iter_mut().zip(&spectrum) {
                *p += x.norm_sqr();
            }
            bins.push(spectrum);
        }
        Ok(Spectrum {
            nfft,
            dt: spacing,
            bins,
            power,
        })
    }

    /// Longest spectrum input over all traces, resampling when `dt` is given.
    fn segment_len<T: Trace>(
        &self,
        traces: &[T],
        low: usize,
        high: usize,
        dt: Option<f64>,
    ) -> Result<usize, ExecInvariantViolation> {
        let Some(dt) = dt else {
            return Ok(high - low);
        };
        traces.iter().try_fold(0, |longest, trace| {
            let (x, y) = (&trace.x()[low..high], &trace.y()[low..high]);
            let resampled = self.interpolator.uniform(x, y, dt)?;
            Ok::<_, ExecInvariantViolation>(longest.max(resampled.len()))
        })
    }

    fn in_range(&self, k: usize, nfft: usize, dt: f64) -> bool {
        let f = k as f64 / (dt * nfft as f64);
        let df = 0.5 / (dt * nfft as f64);
        !(self.fmin.is_some_and(|fmin| f + df < fmin)
            || self.fmax.is_some_and(|fmax| f - df > fmax))
    }

    fn first_bin_in_range(&self, nfft: usize, dt: f64) -> Option<usize> {
        (0..=nfft / 2).find(|&k| self.in_range(k, nfft, dt))
    }

    fn pick_bin(
        &self,
        spectrum: &Spectrum,
        failed: &BTreeMap<usize, usize>,
    ) -> Result<usize, ExecInvariantViolation> {
        let power = &spectrum.power;
        let nbins = power.len();
        let mut first_in_range = None;
        let mut best: Option<(usize, f64)> = None;
        for k in 0..nbins {
            if !self.in_range(k, spectrum.nfft, spectrum.dt) {
                continue;
            }
            first_in_range.get_or_insert(k);

            let below = if k == 0 { f64::NEG_INFINITY } else { power[k - 1] };
            let above = if k + 1 == nbins {
                f64::NEG_INFINITY
            } else {
                power[k + 1]
            };
            if power[k] * self.neighbor_factor <= below.max(above) {
                continue;
            }
            let adjusted = power[k] / (1 + failed.get(&k).copied().unwrap_or(0)) as f64;
            if best.is_none_or(|(_, b)| adjusted > b) {
                best = Some((k, adjusted));
            }
        }
        best.map(|(k, _)| k)
            .or(first_in_range)
            .ok_or(ExecInvariantViolation::InvalidState {
                reason: "frequency range excludes every spectrum bin",
            })
    }

    fn accept<T: Trace>(&mut self, traces: &mut [T], component: SineComponent) {
        for (t, trace) in traces.iter_mut().enumerate() {
            let (x, y) = trace.xy_mut();
            component.subtract_from(t, x, y);
        }
        self.result.powers.push(component.power);
        self.result.components.push(component);
    }

    fn store_spectrum(&mut self, spectrum: &Spectrum) {
        let nt = spectrum.bins.len() as f64;
        let nfft = spectrum.nfft as f64;
        let last = spectrum.power.len() - 1;
        let normalized = spectrum
            .power
            .iter()
            .enumerate()
            .map(|(k, p)| {
                let p = p / nfft / nt;
                if k == 0 || k == last {
                    p
                } else {
                    2.0 * p
                }
            })
            .collect();
        if self.snapshots.frequencies.len() != spectrum.power.len() {
            self.snapshots.frequencies = rfft_frequencies(spectrum.nfft, spectrum.dt);
        }
        self.snapshots.spectra.push(normalized);
        for (phases, bins) in self.snapshots.fft_phases.iter_mut().zip(&spectrum.bins) {
            phases.push(bins.iter().map(|x| x.arg()).collect());
        }
    }
}

/// FFT size for `len` samples: the next power of two at or above `2 (len - 1)`, at least 2.
fn fft_len(len: usize) -> usize {
    (2 * len.saturating_sub(1)).max(2).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::windows::Blackman;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    type Engine = SineSubtract;

    fn engine(config: SineSubtractConfig) -> Engine {
        Engine::try_new(config).expect("config")
    }

    fn tone(n: usize, lines: &[(f64, f64, f64)]) -> Vec<f64> {
        (0..n)
            .map(|i| {
                lines
                    .iter()
                    .map(|(f, amp, phase)| amp * (2.0 * PI * f * i as f64 + phase).sin())
                    .sum()
            })
            .collect()
    }

    fn noise(rng: &mut StdRng, n: usize, sigma: f64) -> Vec<f64> {
        let normal = Normal::new(0.0, sigma).expect("normal");
        (0..n).map(|_| normal.sample(rng)).collect()
    }

    #[test]
    fn recovers_cw_buried_in_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 1024;
        let mut traces: Vec<TraceBuf> = (0..2)
            .map(|_| {
                let y = tone(n, &[(0.1, 5.0, 0.0)])
                    .into_iter()
                    .zip(noise(&mut rng, n, 0.5))
                    .map(|(s, e)| s + e)
                    .collect();
                TraceBuf::uniform(1.0, y)
            })
            .collect();

        let mut cw = engine(SineSubtractConfig {
            maxiter: 20,
            min_power_reduction: 0.01,
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");

        assert!(!result.is_empty());
        let first = &result.components[0];
        assert!((first.freq - 0.1).abs() < 1e-3, "freq {}", first.freq);
        for amp in &first.amps {
            assert!((amp - 5.0).abs() < 0.25, "amp {amp}");
        }
        let initial = result.initial_power().expect("initial power");
        let last = result.final_power().expect("final power");
        assert!(last < 0.1 * initial, "power {initial} -> {last}");
        assert_eq!(result.powers.len(), result.components.len() + 1);
        assert!(result.attempts >= result.components.len());
        assert_eq!(result.attempts, result.components.len() + result.failures);
    }

    #[test]
    fn pure_noise_stops_after_maxiter_plus_one_failures() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut traces = vec![TraceBuf::uniform(1.0, noise(&mut rng, 512, 1.0))];
        let mut cw = engine(SineSubtractConfig {
            maxiter: 3,
            min_power_reduction: 0.5,
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(result.is_empty());
        assert_eq!(result.attempts, 4);
        assert_eq!(result.failures, 4);
        assert_eq!(result.powers.len(), 1);
    }

    #[test]
    fn traces_are_made_zero_mean() {
        let y: Vec<f64> = tone(256, &[(0.25, 1.0, 0.4)]).iter().map(|v| v + 3.0).collect();
        let mut traces = vec![TraceBuf::uniform(1.0, y)];
        let mut cw = engine(SineSubtractConfig {
            maxiter: 0,
            min_power_reduction: 0.99999,
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        let initial = result.initial_power().expect("initial power");
        assert_abs_diff_eq!(initial, 0.5, epsilon = 1e-2);
    }

    #[test]
    fn mean_is_removed_outside_the_sample_range() {
        let mut traces = vec![TraceBuf::uniform(1.0, vec![3.0; 400])];
        let mut cw = engine(SineSubtractConfig {
            maxiter: 0,
            tmin: Some(50),
            tmax: Some(300),
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(result.is_empty());
        assert!(traces[0].y.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn frequency_range_skips_out_of_band_lines() {
        let y = tone(512, &[(0.1, 3.0, 0.0), (0.3, 1.0, 0.5)]);
        let mut traces = vec![TraceBuf::uniform(1.0, y)];
        let mut cw = engine(SineSubtractConfig {
            fmin: Some(0.2),
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(!result.is_empty());
        assert_abs_diff_eq!(result.components[0].freq, 0.3, epsilon = 1e-3);
        assert!(result.freqs().iter().all(|f| *f > 0.19));
    }

    #[test]
    fn sample_range_limits_the_fit() {
        let y = tone(400, &[(0.2, 1.5, 1.0)]);
        let mut traces = vec![TraceBuf::uniform(0.5, y)];
        let mut cw = engine(SineSubtractConfig {
            tmin: Some(50),
            tmax: Some(300),
            ..Default::default()
        });
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(!result.is_empty());
        // Abscissae are in units of 0.5 samples.
        assert_abs_diff_eq!(result.components[0].freq, 0.4, epsilon = 1e-3);
        assert_abs_diff_eq!(result.components[0].amps[0], 1.5, epsilon = 1e-2);
        // The subtraction covers the samples outside the range too.
        assert!(traces[0].y[..50].iter().all(|v| v.abs() < 1e-2));
    }

    #[test]
    fn irregular_samples_are_resampled_for_spectra() {
        let n = 512;
        let x: Vec<f64> = (0..n).map(|i| i as f64 + 0.2 * (i as f64).sin()).collect();
        let y: Vec<f64> = x.iter().map(|xi| 2.0 * (2.0 * PI * 0.05 * xi).sin()).collect();
        let trace = TraceBuf::try_new(x, y).expect("trace");

        let mut cw = engine(SineSubtractConfig::default());
        let filtered = cw.subtract_cw_copy(&trace, Some(1.0)).expect("subtract");
        let result = cw.result();
        assert!(!result.is_empty());
        assert_abs_diff_eq!(result.components[0].freq, 0.05, epsilon = 1e-3);
        assert_abs_diff_eq!(result.components[0].amps[0], 2.0, epsilon = 1e-2);

        // The copy is filtered, the input is not.
        assert!(filtered.y.iter().all(|v| v.abs() < 1e-2));
        assert!(trace.y.iter().any(|v| v.abs() > 1.0));
    }

    #[test]
    fn windows_only_shape_the_seed() {
        for shaped in [
            engine(SineSubtractConfig {
                window: Some(WindowShape::Hann),
                ..Default::default()
            }),
            engine(SineSubtractConfig::default()).with_window(Box::new(Blackman)),
        ] {
            let mut cw = shaped;
            let mut traces = vec![TraceBuf::uniform(1.0, tone(300, &[(0.17, 0.8, -2.0)]))];
            let result = cw.subtract_cw(&mut traces, None).expect("subtract");
            assert!(!result.is_empty());
            assert_abs_diff_eq!(result.components[0].freq, 0.17, epsilon = 1e-3);
            assert_abs_diff_eq!(result.components[0].amps[0], 0.8, epsilon = 1e-2);
        }
    }

    #[test]
    fn store_keeps_one_stage_per_accepted_component() {
        let mut traces = vec![
            TraceBuf::uniform(1.0, tone(256, &[(0.125, 2.0, 0.3)])),
            TraceBuf::uniform(1.0, tone(256, &[(0.125, 1.0, -0.3)])),
        ];
        let mut cw = engine(SineSubtractConfig {
            store: true,
            ..Default::default()
        });
        let accepted = cw.subtract_cw(&mut traces, None).expect("subtract").len();
        let snapshots = cw.snapshots().expect("snapshots");
        assert_eq!(snapshots.traces.len(), 2);
        assert_eq!(snapshots.traces[0].len(), accepted + 1);
        assert_eq!(snapshots.spectra.len(), accepted + 1);
        assert_eq!(snapshots.fft_phases[1].len(), accepted + 1);
        assert_eq!(snapshots.frequencies.len(), 257);
        assert_eq!(snapshots.spectra[0].len(), 257);

        // First spectrum peaks at the tone.
        let peak = snapshots.spectra[0]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .expect("peak");
        assert_abs_diff_eq!(snapshots.frequencies[peak], 0.125, epsilon = 1e-9);

        cw.reset();
        let snapshots = cw.snapshots().expect("snapshots");
        assert!(snapshots.traces.is_empty());
        assert!(snapshots.spectra.is_empty());
        assert!(cw.result().is_empty());
    }

    #[test]
    fn snapshots_are_absent_without_store() {
        let mut traces = vec![TraceBuf::uniform(1.0, tone(64, &[(0.25, 1.0, 0.0)]))];
        let mut cw = engine(SineSubtractConfig::default());
        cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(cw.snapshots().is_none());
    }

    #[test]
    fn config_is_validated() {
        let cases = [
            (
                SineSubtractConfig {
                    min_power_reduction: 0.0,
                    ..Default::default()
                },
                "min_power_reduction",
            ),
            (
                SineSubtractConfig {
                    min_power_reduction: f64::NAN,
                    ..Default::default()
                },
                "min_power_reduction",
            ),
            (
                SineSubtractConfig {
                    neighbor_factor: 0.0,
                    ..Default::default()
                },
                "neighbor_factor",
            ),
            (
                SineSubtractConfig {
                    tmin: Some(10),
                    tmax: Some(10),
                    ..Default::default()
                },
                "tmax",
            ),
            (
                SineSubtractConfig {
                    fmin: Some(-1.0),
                    ..Default::default()
                },
                "fmin",
            ),
            (
                SineSubtractConfig {
                    fmin: Some(0.3),
                    fmax: Some(0.2),
                    ..Default::default()
                },
                "fmax",
            ),
        ];
        for (config, name) in cases {
            match Engine::try_new(config) {
                Err(ConfigError::InvalidArgument { arg, .. }) => assert_eq!(arg, name),
                Err(other) => panic!("unexpected error {other}"),
                Ok(_) => panic!("{name} should be rejected"),
            }
        }
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let mut cw = engine(SineSubtractConfig::default());

        let mut none: Vec<TraceBuf> = Vec::new();
        assert!(matches!(
            cw.subtract_cw(&mut none, None),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));

        let mut ragged = vec![
            TraceBuf::uniform(1.0, vec![0.0; 16]),
            TraceBuf::uniform(1.0, vec![0.0; 15]),
        ];
        assert!(matches!(
            cw.subtract_cw(&mut ragged, None),
            Err(ExecInvariantViolation::LengthMismatch {
                expected: 16,
                got: 15,
                ..
            })
        ));

        let mut short = vec![TraceBuf::uniform(1.0, vec![1.0])];
        assert!(matches!(
            cw.subtract_cw(&mut short, None),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));

        let mut ok = vec![TraceBuf::uniform(1.0, tone(32, &[(0.25, 1.0, 0.0)]))];
        assert!(matches!(
            cw.subtract_cw(&mut ok, Some(0.0)),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));
    }

    #[test]
    fn errors_leave_traces_untouched() {
        let y: Vec<f64> = tone(64, &[(0.1, 1.0, 0.0)]).iter().map(|v| v + 3.0).collect();
        let mut traces = vec![TraceBuf::uniform(1.0, y.clone())];
        let mut cw = engine(SineSubtractConfig {
            fmin: Some(10.0),
            ..Default::default()
        });
        assert!(matches!(
            cw.subtract_cw(&mut traces, None),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));
        assert_eq!(traces[0].y, y);
        assert!(cw.result().powers.is_empty());

        let mut x: Vec<f64> = (0..64).map(|i| i as f64).collect();
        x.swap(10, 11);
        let mut traces = vec![TraceBuf::try_new(x, y.clone()).expect("trace")];
        let mut cw = engine(SineSubtractConfig::default());
        assert!(matches!(
            cw.subtract_cw(&mut traces, Some(1.0)),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));
        assert_eq!(traces[0].y, y);
        assert!(cw.result().powers.is_empty());
    }

    fn spectrum(power: Vec<f64>) -> Spectrum {
        Spectrum {
            nfft: 2 * (power.len() - 1),
            dt: 1.0,
            bins: Vec::new(),
            power,
        }
    }

    #[test]
    fn failed_bins_are_demoted_not_excluded() {
        let cw = engine(SineSubtractConfig::default());
        let spec = spectrum(vec![10.0, 1.0, 5.0, 1.0, 4.0]);
        let mut failed = BTreeMap::new();
        let mut picks = Vec::new();
        for fail in [None, Some((0, 2)), Some((2, 1)), Some((4, 1))] {
            if let Some((bin, count)) = fail {
                failed.insert(bin, count);
            }
            picks.push(cw.pick_bin(&spec, &failed).expect("bin"));
        }
        // 10/3 beats 5/2 and 4/2 once every peak has failed.
        assert_eq!(picks, vec![0, 2, 4, 0]);
    }

    #[test]
    fn peaks_must_beat_their_neighbors() {
        let cw = engine(SineSubtractConfig::default());
        let none = BTreeMap::new();

        // Only the upper edge is a local maximum; its missing neighbor passes.
        let rising = spectrum(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(cw.pick_bin(&rising, &none).expect("bin"), 4);

        // A heavily failed peak still outranks bins that are not peaks.
        let failed = BTreeMap::from([(2, 100)]);
        let single = spectrum(vec![1.0, 2.0, 9.0, 2.0, 1.0]);
        assert_eq!(cw.pick_bin(&single, &failed).expect("bin"), 2);

        let lenient = engine(SineSubtractConfig {
            neighbor_factor: 2.0,
            ..Default::default()
        });
        let shoulder = spectrum(vec![1.0, 3.0, 4.0, 1.0, 1.0]);
        assert_eq!(cw.pick_bin(&shoulder, &none).expect("bin"), 2);
        assert_eq!(
            lenient.pick_bin(&shoulder, &BTreeMap::from([(2, 1)])).expect("bin"),
            1
        );
    }

    #[test]
    fn flat_spectrum_falls_back_to_first_bin_in_range() {
        let none = BTreeMap::new();
        let flat = spectrum(vec![1.0; 5]);

        let cw = engine(SineSubtractConfig::default());
        assert_eq!(cw.pick_bin(&flat, &none).expect("bin"), 0);

        // Bin k sits at k / 8; bin 1 is more than half a bin below 0.25.
        let banded = engine(SineSubtractConfig {
            fmin: Some(0.25),
            ..Default::default()
        });
        assert_eq!(banded.pick_bin(&flat, &none).expect("bin"), 2);

        let empty = engine(SineSubtractConfig {
            fmin: Some(1.0),
            ..Default::default()
        });
        assert!(matches!(
            empty.pick_bin(&flat, &none),
            Err(ExecInvariantViolation::InvalidState { .. })
        ));
    }

    #[test]
    fn mutable_references_are_traces() {
        let mut a = TraceBuf::uniform(1.0, tone(128, &[(0.25, 1.0, 0.2)]));
        let mut b = TraceBuf::uniform(1.0, tone(128, &[(0.25, 0.5, 0.9)]));
        let mut cw = engine(SineSubtractConfig::default());
        let mut traces = [&mut a, &mut b];
        let result = cw.subtract_cw(&mut traces, None).expect("subtract");
        assert!(!result.is_empty());
        assert!(a.y.iter().chain(&b.y).all(|v| v.abs() < 1e-2));
    }
}
