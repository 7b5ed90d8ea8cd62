//! Scheduled units of work run from the optimisation callback.
//!
//! A [`Task`] owns a [`Schedule`] and an action. On every callback the driver
//! asks each task, in registration order, to [`evaluate`](Task::evaluate)
//! itself: the task fires if its schedule is due or the call is forced, then
//! re-arms its schedule.
//!
//! # Tasks
//!
//! - [`ProgressPrinter`] — prints one overwritten progress line
//! - [`HistoryLogger`] — appends a row to the history table
//! - [`HistoryStore`] — writes the history table to disk
//! - [`Timeout`] — requests a stop once, after a time or iteration limit

mod logger;
mod progress;
mod store;
mod timeout;

pub use logger::HistoryLogger;
pub use progress::ProgressPrinter;
pub use store::HistoryStore;
pub use timeout::Timeout;

use opt_tools_core::{Action, Objective};

use crate::{Context, Error, Schedule};

/// A scheduled action with access to the shared [`Context`].
pub trait Task<O: Objective> {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn schedule(&self) -> &Schedule;

    fn schedule_mut(&mut self) -> &mut Schedule;

    /// Called once when the task is registered with a driver.
    fn setup(&mut self, ctx: &mut Context<O>) {
        let _ = ctx;
    }

    /// Performs the task's effect.
    ///
    /// Returning `Some(Action::StopEarly)` asks the driver to finish the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect fails; the driver propagates it.
    fn fire(&mut self, ctx: &mut Context<O>, x: &[f64]) -> Result<Option<Action>, Error>;

    /// Fires the task if it is due, or unconditionally if `force` is set.
    ///
    /// After firing, the schedule is re-armed past the progress reached once
    /// the task finished.
    ///
    /// # Errors
    ///
    /// Returns any error raised by [`Task::fire`].
    fn evaluate(
        &mut self,
        ctx: &mut Context<O>,
        x: &[f64],
        force: bool,
    ) -> Result<Option<Action>, Error> {
        let trigger = self.schedule().trigger();
        if !force && !self.schedule().is_due(ctx.progress(trigger)) {
            return Ok(None);
        }

        tracing::debug!(
            task = self.name(),
            iteration = ctx.iteration(),
            forced = force,
            "task fired"
        );
        let action = self.fire(ctx, x)?;
        self.schedule_mut().advance(ctx.progress(trigger));
        Ok(action)
    }
}
