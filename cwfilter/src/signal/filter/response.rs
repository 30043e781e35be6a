use crate::kernel::ExecInvariantViolation;
use crate::signal::traits::DigitalFilter;
use cwfilter_core::num_rs::unwrap_in_place;
use nalgebra::Complex;

const FREQUENCY_LABEL: &str = "Normalized Frequency (f/f_nyq)";

/// A labelled sampled curve, ready for a plotting front end.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    /// Abscissa.
    pub x: Vec<f64>,
    /// Ordinate.
    pub y: Vec<f64>,
    /// Curve title.
    pub title: &'static str,
    /// Abscissa label.
    pub x_label: &'static str,
    /// Ordinate label.
    pub y_label: &'static str,
    /// Suggested display range for `y`.
    pub y_range: Option<(f64, f64)>,
}

impl Curve {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Amplitude, phase and group delay of a filter along the upper unit circle.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyResponse {
    /// `10 ln|H|` at every requested frequency.
    pub amplitude: Curve,
    /// Phase in degrees within `[0, 360)`, without the first and last frequency.
    pub phase: Curve,
    /// Negative phase increment between neighbouring frequencies, in degrees, without the
    /// first two and the last frequency.
    pub group_delay: Curve,
}

/// Evaluate `filter` at `n >= 4` frequencies `f_i = i / (n - 1)` (units of Nyquist).
///
/// The amplitude uses `10 ln|H|` (`-1000` where `|H| = 0`). Phases are rounded to six
/// decimals with ties to even before being shifted into `[0, 360)`. The group delay unwraps the full
/// phase sequence with period 360 and differences neighbours,
/// `delay[i] = phase[i - 1] - phase[i]`.
pub fn frequency_response<F>(filter: &F, n: usize) -> Result<FrequencyResponse, ExecInvariantViolation>
where
    F: DigitalFilter + ?Sized,
{
    if n < 4 {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "frequency response needs at least 4 points",
        });
    }

    let step = 1.0 / (n - 1) as f64;
    let freqs: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();

    let mut amplitude = Vec::with_capacity(n);
    let mut phase = Vec::with_capacity(n);
    for f in &freqs {
        let z = Complex::new(0.0, core::f64::consts::PI * f).exp();
        let h = filter.transfer(z);
        let mag = h.norm();
        amplitude.push(if mag == 0.0 { -1000.0 } else { 10.0 * mag.ln() });

        let mut angle = (180.0 * h.arg() / core::f64::consts::PI * 1e6).round_ties_even() / 1e6;
        if angle < 0.0 {
            angle += 360.0;
        }
        phase.push(angle);
    }

    let mut delay = phase.clone();
    unwrap_in_place(&mut delay, 360.0);
    let mut last = delay[0];
    delay[0] = 0.0;
    for d in delay.iter_mut().skip(1) {
        let current = *d;
        *d = last - current;
        last = current;
    }

    Ok(FrequencyResponse {
        amplitude: Curve {
            x: freqs.clone(),
            y: amplitude,
            title: "Amplitude Response",
            x_label: FREQUENCY_LABEL,
            y_label: "Magnitude (dB)",
            y_range: Some((-80.0, 10.0)),
        },
        phase: Curve {
            x: freqs[1..n - 1].to_vec(),
            y: phase[1..n - 1].to_vec(),
            title: "Phase Response",
            x_label: FREQUENCY_LABEL,
            y_label: "Phase (deg)",
            y_range: None,
        },
        group_delay: Curve {
            x: freqs[2..n - 1].to_vec(),
            y: delay[2..n - 1].to_vec(),
            title: "Group Delay",
            x_label: FREQUENCY_LABEL,
            y_label: "Normalized Time (t/(2T))",
            y_range: None,
        },
    })
}
