use std::iter;

use opt_tools_core::{Action, Objective};

use crate::{ConfigError, Context, Error, Schedule, Task};

/// Requests the end of the run once a limit is reached.
///
/// The first time it fires, the timeout returns [`Action::StopEarly`]; the
/// driver then finishes the run and hands the action to the caller. Later
/// firings, including the forced one during the finish itself, do nothing.
#[derive(Debug)]
pub struct Timeout {
    schedule: Schedule,
    triggered: bool,
}

impl Timeout {
    /// Creates a timeout that fires once `seconds` have elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Timeout`] if `seconds` is negative or NaN.
    pub fn new(seconds: f64) -> Result<Self, ConfigError> {
        if seconds.is_nan() || seconds < 0.0 {
            return Err(ConfigError::Timeout(seconds));
        }
        Ok(Self {
            schedule: Schedule::seconds(iter::repeat(seconds)),
            triggered: false,
        })
    }

    /// Creates a timeout that fires at iteration `iterations`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn after_iterations(iterations: usize) -> Self {
        Self {
            schedule: Schedule::iterations(iter::repeat(iterations as f64)),
            triggered: false,
        }
    }

    /// Returns `true` once the timeout has fired.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.triggered
    }
}

impl<O: Objective> Task<O> for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn fire(&mut self, ctx: &mut Context<O>, _x: &[f64]) -> Result<Option<Action>, Error> {
        if self.triggered {
            return Ok(None);
        }
        self.triggered = true;
        tracing::info!(
            iteration = ctx.iteration(),
            elapsed = ctx.elapsed().as_secs_f64(),
            "timeout reached"
        );
        Ok(Some(Action::StopEarly))
    }
}
