use std::iter::FusedIterator;

use thiserror::Error;

/// Errors that can occur when building an [`ExpLin`] sequence.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SequenceError {
    #[error("growth must be finite and at least 1, got {0}")]
    Growth(f64),

    #[error("max_gap must be positive, got {0}")]
    MaxGap(f64),

    #[error("start must be finite, got {0}")]
    Start(f64),

    #[error("start_jump must be finite and positive, got {0}")]
    StartJump(f64),
}

/// An infinite, strictly increasing sequence of trigger thresholds.
///
/// The first value is `start`. Each following value adds a gap to the
/// previous one, where the gap begins at `start_jump` and is multiplied by
/// `growth` after every emission, capped at `max_gap`. Once the cap is hit
/// the sequence continues linearly.
///
/// Thresholds are plain `f64` values and are interpreted by the consumer,
/// either as iteration counts or as elapsed seconds.
///
/// # Examples
///
/// ```
/// use opt_tools_core::ExpLin;
///
/// let seq = ExpLin::new(2.0, 4.0).unwrap();
/// let values: Vec<f64> = seq.take(6).collect();
///
/// assert_eq!(values, vec![1.0, 3.0, 7.0, 11.0, 15.0, 19.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpLin {
    growth: f64,
    max_gap: f64,
    gap: f64,
    last: f64,
}

impl ExpLin {
    /// Creates a sequence starting at `1.0` with an initial gap of `1.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `growth` is below one or non-finite, or if
    /// `max_gap` is not positive. An infinite `max_gap` is allowed.
    pub fn new(growth: f64, max_gap: f64) -> Result<Self, SequenceError> {
        Self::with_start(growth, max_gap, 1.0, 1.0)
    }

    /// Creates a sequence with an explicit first value and initial gap.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument is out of range; see [`ExpLin::new`].
    pub fn with_start(
        growth: f64,
        max_gap: f64,
        start: f64,
        start_jump: f64,
    ) -> Result<Self, SequenceError> {
        if !growth.is_finite() || growth < 1.0 {
            return Err(SequenceError::Growth(growth));
        }
        if max_gap.is_nan() || max_gap <= 0.0 {
            return Err(SequenceError::MaxGap(max_gap));
        }
        if !start.is_finite() {
            return Err(SequenceError::Start(start));
        }
        if !start_jump.is_finite() || start_jump <= 0.0 {
            return Err(SequenceError::StartJump(start_jump));
        }

        Ok(Self {
            growth,
            max_gap,
            gap: start_jump,
            last: start - start_jump,
        })
    }

    /// Returns the first value greater than `progress`, consuming every value
    /// up to it.
    ///
    /// Matches calling [`Iterator::next`] until a value exceeds `progress`,
    /// but crosses the linear phase in a single jump, so catching up to a
    /// large iteration count after a resume stays cheap.
    pub fn next_after(&mut self, progress: f64) -> f64 {
        while self.last + self.gap <= progress {
            if self.gap >= self.max_gap || self.growth <= 1.0 {
                let steps = ((progress - self.last) / self.gap).floor() - 1.0;
                if steps > 0.0 {
                    self.last += steps * self.gap;
                }
                while self.last + self.gap <= progress {
                    self.last += self.gap;
                }
                break;
            }
            self.step();
        }
        self.step()
    }

    fn step(&mut self) -> f64 {
        let value = self.last + self.gap;
        self.last = value;
        self.gap = (self.gap * self.growth).min(self.max_gap);
        value
    }
}

impl Iterator for ExpLin {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.step())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for ExpLin {}

/// Creates an [`ExpLin`] sequence starting at `1.0` with an initial gap of `1.0`.
///
/// # Errors
///
/// Returns an error if the arguments are out of range; see [`ExpLin::new`].
pub fn seq_exp_lin(growth: f64, max_gap: f64) -> Result<ExpLin, SequenceError> {
    ExpLin::new(growth, max_gap)
}

/// The sequence `1, 2, 3, ...`, which fires an iteration-triggered task every step.
#[must_use]
pub fn every_iteration() -> ExpLin {
    ExpLin {
        growth: 1.0,
        max_gap: 1.0,
        gap: 1.0,
        last: 0.0,
    }
}
