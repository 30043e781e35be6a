use core::f64::consts::PI;

/// One fitted sinusoid shared by every trace: a common frequency with per-trace phase and
/// amplitude, `y_t(x) = A_t sin(2 pi f x + phi_t)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SineComponent {
    /// Frequency, in inverse units of the trace abscissa.
    pub freq: f64,
    /// One-sigma error on `freq`.
    pub freq_err: f64,
    /// Phase per trace, in `[-pi, pi)`.
    pub phases: Vec<f64>,
    /// One-sigma phase errors.
    pub phase_errs: Vec<f64>,
    /// Amplitude per trace.
    pub amps: Vec<f64>,
    /// One-sigma amplitude errors.
    pub amp_errs: Vec<f64>,
    /// Mean residual power over the fitted samples once this component is removed.
    pub power: f64,
}

impl SineComponent {
    /// Number of traces the component was fitted on.
    pub fn ntraces(&self) -> usize {
        self.amps.len()
    }

    /// Model value for trace `trace` at abscissa `x`.
    pub fn value(&self, trace: usize, x: f64) -> f64 {
        self.amps[trace] * (2.0 * PI * self.freq * x + self.phases[trace]).sin()
    }

    /// Subtract the model of trace `trace` from `y` sampled at `x`.
    pub fn subtract_from(&self, trace: usize, x: &[f64], y: &mut [f64]) {
        for (yi, xi) in y.iter_mut().zip(x) {
            *yi -= self.value(trace, *xi);
        }
    }
}

/// Log of one continuous-wave subtraction run.
///
/// `powers[0]` is the mean power before anything was removed; every accepted component
/// appends one entry, so `powers.len() == components.len() + 1` for a single run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SineSubtractResult {
    /// Accepted components in the order they were removed.
    pub components: Vec<SineComponent>,
    /// Power trajectory.
    pub powers: Vec<f64>,
    /// Number of peak fits attempted.
    pub attempts: usize,
    /// Number of attempts that were rejected.
    pub failures: usize,
}

impl SineSubtractResult {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Concatenate `other` after `self`, preserving order.
    pub fn append(&mut self, other: &SineSubtractResult) {
        self.components.extend_from_slice(&other.components);
        self.powers.extend_from_slice(&other.powers);
        self.attempts += other.attempts;
        self.failures += other.failures;
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.components.clear();
        self.powers.clear();
        self.attempts = 0;
        self.failures = 0;
    }

    /// Power before the first subtraction.
    pub fn initial_power(&self) -> Option<f64> {
        self.powers.first().copied()
    }

    /// Power after the last accepted subtraction.
    pub fn final_power(&self) -> Option<f64> {
        self.powers.last().copied()
    }

    /// Frequencies of the accepted components.
    pub fn freqs(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.freq).collect()
    }

    /// Frequency errors of the accepted components.
    pub fn freq_errs(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.freq_err).collect()
    }

    /// Amplitudes fitted on trace `trace`.
    pub fn amps(&self, trace: usize) -> Vec<f64> {
        self.components.iter().map(|c| c.amps[trace]).collect()
    }

    /// Amplitude errors on trace `trace`.
    pub fn amp_errs(&self, trace: usize) -> Vec<f64> {
        self.components.iter().map(|c| c.amp_errs[trace]).collect()
    }

    /// Phases fitted on trace `trace`.
    pub fn phases(&self, trace: usize) -> Vec<f64> {
        self.components.iter().map(|c| c.phases[trace]).collect()
    }

    /// Phase errors on trace `trace`.
    pub fn phase_errs(&self, trace: usize) -> Vec<f64> {
        self.components.iter().map(|c| c.phase_errs[trace]).collect()
    }
}

/// Diagnostics kept by the engine when storage is enabled.
///
/// Everything is plain data for a plotting front end. Spectra are stored for every
/// accepted iteration and for the iteration that ended the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshots {
    /// `traces[t][k]`: ordinate of trace `t` after `k` accepted subtractions
    /// (`k = 0` is the zero-mean input).
    pub traces: Vec<Vec<Vec<f64>>>,
    /// Frequency of every spectrum bin.
    pub frequencies: Vec<f64>,
    /// Normalized aggregate power spectrum per stored iteration.
    pub spectra: Vec<Vec<f64>>,
    /// `fft_phases[t][s]`: per-bin FFT phase of trace `t` for stored spectrum `s`.
    pub fft_phases: Vec<Vec<Vec<f64>>>,
}

impl Snapshots {
    /// Drop all stored data.
    pub fn clear(&mut self) {
        self.traces.clear();
        self.frequencies.clear();
        self.spectra.clear();
        self.fft_phases.clear();
    }
}
