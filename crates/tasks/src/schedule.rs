use std::{any::Any, fmt};

use opt_tools_core::ExpLin;
use serde::{Deserialize, Serialize};

/// The quantity a [`Schedule`]'s thresholds are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Thresholds are iteration indices.
    #[serde(rename = "iter")]
    Iteration,

    /// Thresholds are seconds elapsed since the run started.
    #[serde(rename = "time")]
    Time,
}

/// Decides when a task is due, from a lazy sequence of thresholds.
///
/// A schedule is armed with the next threshold pulled from its sequence. It is
/// due once progress (in the units of its [`Trigger`]) reaches that threshold.
/// After the task fires, [`Schedule::advance`] re-arms it past the progress
/// made so far, so a slow task does not fire on every following call to
/// catch up.
///
/// A schedule without a sequence, or whose sequence is exhausted, is dormant:
/// it is never due, and its task only runs when forced.
pub struct Schedule {
    sequence: Option<Thresholds>,
    trigger: Trigger,
    next: f64,
}

/// [`ExpLin`] is kept unboxed so that skipping can jump its linear phase.
enum Thresholds {
    ExpLin(ExpLin),
    Boxed(Box<dyn Iterator<Item = f64>>),
}

impl Thresholds {
    fn from_sequence<I>(iter: I) -> Self
    where
        I: Iterator<Item = f64> + 'static,
    {
        match (&iter as &dyn Any).downcast_ref::<ExpLin>() {
            Some(exp_lin) => Self::ExpLin(*exp_lin),
            None => Self::Boxed(Box::new(iter)),
        }
    }

    fn next(&mut self) -> Option<f64> {
        match self {
            Self::ExpLin(seq) => seq.next(),
            Self::Boxed(seq) => seq.next(),
        }
    }

    /// Pulls at least one value, then skips any not ahead of `progress`.
    ///
    /// Skipping stops early if the sequence stops increasing.
    fn next_after(&mut self, progress: f64) -> Option<f64> {
        let seq = match self {
            Self::ExpLin(seq) => return Some(seq.next_after(progress)),
            Self::Boxed(seq) => seq,
        };

        let mut next = seq.next()?;
        while next <= progress {
            match seq.next() {
                Some(value) if value > next => next = value,
                Some(_) => break,
                None => return None,
            }
        }
        Some(next)
    }
}

impl Schedule {
    /// Creates a schedule armed with the first value of `sequence`.
    pub fn new<S>(sequence: S, trigger: Trigger) -> Self
    where
        S: IntoIterator<Item = f64>,
        S::IntoIter: 'static,
    {
        let mut sequence = Thresholds::from_sequence(sequence.into_iter());
        match sequence.next() {
            Some(next) => Self {
                sequence: Some(sequence),
                trigger,
                next,
            },
            None => Self::dormant(trigger),
        }
    }

    /// Creates a schedule whose thresholds are iteration indices.
    pub fn iterations<S>(sequence: S) -> Self
    where
        S: IntoIterator<Item = f64>,
        S::IntoIter: 'static,
    {
        Self::new(sequence, Trigger::Iteration)
    }

    /// Creates a schedule whose thresholds are elapsed seconds.
    pub fn seconds<S>(sequence: S) -> Self
    where
        S: IntoIterator<Item = f64>,
        S::IntoIter: 'static,
    {
        Self::new(sequence, Trigger::Time)
    }

    /// Creates a schedule that is never due.
    #[must_use]
    pub fn dormant(trigger: Trigger) -> Self {
        Self {
            sequence: None,
            trigger,
            next: f64::INFINITY,
        }
    }

    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Returns the threshold the schedule is armed with.
    #[must_use]
    pub fn next(&self) -> f64 {
        self.next
    }

    /// Returns `true` once `progress` has reached the armed threshold.
    #[must_use]
    pub fn is_due(&self, progress: f64) -> bool {
        progress >= self.next
    }

    /// Re-arms the schedule after its task fired at `progress`.
    ///
    /// Pulls at least one threshold, then skips any that are not ahead of
    /// `progress`. Skipping stops early if the sequence stops increasing, so
    /// a constant sequence re-arms at its constant.
    pub fn advance(&mut self, progress: f64) {
        let Some(sequence) = self.sequence.as_mut() else {
            return;
        };

        match sequence.next_after(progress) {
            Some(next) => self.next = next,
            None => self.exhaust(),
        }
    }

    fn exhaust(&mut self) {
        self.sequence = None;
        self.next = f64::INFINITY;
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("trigger", &self.trigger)
            .field("next", &self.next)
            .field("dormant", &self.sequence.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::iter;

    use approx::assert_relative_eq;
    use opt_tools_core::{ExpLin, every_iteration};

    #[test]
    fn armed_with_first_value() {
        let schedule = Schedule::iterations(ExpLin::with_start(2.0, 100.0, 3.0, 1.0).unwrap());

        assert_relative_eq!(schedule.next(), 3.0);
        assert!(!schedule.is_due(2.0));
        assert!(schedule.is_due(3.0));
    }

    #[test]
    fn advance_pulls_one_value_when_on_time() {
        let mut schedule = Schedule::iterations(every_iteration());

        schedule.advance(1.0);
        assert_relative_eq!(schedule.next(), 2.0);

        schedule.advance(2.0);
        assert_relative_eq!(schedule.next(), 3.0);
    }

    #[test]
    fn advance_skips_thresholds_in_the_past() {
        let mut schedule = Schedule::seconds(every_iteration());

        // The task took until t = 7.5 to finish.
        schedule.advance(7.5);

        assert_relative_eq!(schedule.next(), 8.0);
    }

    #[test]
    fn catching_up_to_a_resumed_iteration_is_immediate() {
        let mut schedule = Schedule::iterations(every_iteration());

        schedule.advance(2e11);

        assert_relative_eq!(schedule.next(), 2e11 + 1.0);
    }

    #[test]
    fn other_iterators_skip_by_walking() {
        let mut schedule = Schedule::iterations((1_u32..).map(f64::from));

        schedule.advance(50.5);

        assert_relative_eq!(schedule.next(), 51.0);
    }

    #[test]
    fn constant_sequence_rearms_at_constant() {
        let mut schedule = Schedule::seconds(iter::repeat(2.0));

        schedule.advance(10.0);

        assert_relative_eq!(schedule.next(), 2.0);
        assert!(schedule.is_due(10.0));
    }

    #[test]
    fn exhausted_sequence_goes_dormant() {
        let mut schedule = Schedule::iterations([1.0, 2.0]);

        schedule.advance(1.0);
        assert_relative_eq!(schedule.next(), 2.0);

        schedule.advance(2.0);
        assert!(schedule.next().is_infinite());
        assert!(!schedule.is_due(1e12));
    }

    #[test]
    fn empty_sequence_is_dormant() {
        let schedule = Schedule::iterations(iter::empty());

        assert!(!schedule.is_due(f64::MAX));
        assert_eq!(schedule.trigger(), Trigger::Iteration);
    }
}
