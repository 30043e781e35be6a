use crate::kernel::ExecInvariantViolation;
use crate::signal::traits::DigitalFilter;
use core::cell::RefCell;
use core::fmt;
use nalgebra::Complex;

/// Filters applied one after another.
///
/// The transfer function is the product of the stage transfer functions. Intermediate
/// results live in two scratch buffers owned by the series, grown to the longest input seen
/// and reused afterwards, so repeated filtering does not allocate. An empty series is the
/// identity.
#[derive(Default)]
pub struct FilterSeries {
    stages: Vec<Box<dyn DigitalFilter>>,
    arena: RefCell<[Vec<f64>; 2]>,
}

impl FilterSeries {
    /// Empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn push<F: DigitalFilter + 'static>(&mut self, filter: F) {
        self.stages.push(Box::new(filter));
    }

    /// Append an already boxed stage.
    pub fn push_boxed(&mut self, filter: Box<dyn DigitalFilter>) {
        self.stages.push(filter);
    }

    /// Builder form of [`FilterSeries::push`].
    pub fn then<F: DigitalFilter + 'static>(mut self, filter: F) -> Self {
        self.push(filter);
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the series has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for FilterSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSeries")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl DigitalFilter for FilterSeries {
    fn filter_into(&self, input: &[f64], out: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        let n = input.len();
        if out.len() != n {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: n,
                got: out.len(),
            });
        }
        let Some(last) = self.stages.len().checked_sub(1) else {
            out.copy_from_slice(input);
            return Ok(());
        };

        let mut arena =
            self.arena
                .try_borrow_mut()
                .map_err(|_| ExecInvariantViolation::InvalidState {
                    reason: "filter series scratch space is already in use",
                })?;
        for buf in arena.iter_mut() {
            if buf.len() < n {
                buf.resize(n, 0.0);
            }
        }
        let [front, back] = &mut *arena;
        let (mut src, mut dst) = (front, back);

        for (k, stage) in self.stages.iter().enumerate() {
            let stage_in: &[f64] = if k == 0 { input } else { &src[..n] };
            if k == last {
                stage.filter_into(stage_in, out)?;
            } else {
                stage.filter_into(stage_in, &mut dst[..n])?;
                core::mem::swap(&mut src, &mut dst);
            }
        }
        Ok(())
    }

    fn transfer(&self, z: Complex<f64>) -> Complex<f64> {
        self.stages
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, stage| acc * stage.transfer(z))
    }
}
