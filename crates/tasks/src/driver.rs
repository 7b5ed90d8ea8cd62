use std::{fmt, time::Duration};

use opt_tools_core::{Action, History, Objective, Observer, Step, Stopwatch};

use crate::{Config, ConfigError, Context, Error, Task};

/// Runs registered tasks from an external optimiser's per-step callback.
///
/// The optimiser calls [`Driver::callback`] once per step with its current
/// parameter vector. The driver increments the iteration counter, lets each
/// task fire if due (in registration order), then passes the step to the
/// chained observer, if any.
///
/// When a task returns [`Action::StopEarly`], the driver runs [`Driver::finish`]
/// and returns the action; the caller should stop stepping and may recover the
/// last recorded state from [`Driver::history`]. At the natural end of a run,
/// the caller should call [`Driver::finish`] itself so that every task fires
/// one last time. Finishing again at the same iteration does nothing.
///
/// # Example
///
/// ```
/// use opt_tools_core::{Action, every_iteration, objective};
/// use opt_tools_tasks::{Driver, HistoryLogger, Schedule, Timeout};
///
/// let objective = objective::combined(|x: &[f64]| {
///     (x.iter().map(|v| v * v).sum(), x.iter().map(|v| 2.0 * v).collect())
/// });
/// let mut driver = Driver::new(objective)
///     .with_task(HistoryLogger::new(Schedule::iterations(every_iteration())))
///     .with_task(Timeout::after_iterations(50));
///
/// let mut x = vec![1.0, -2.0];
/// loop {
///     for v in &mut x {
///         *v *= 0.9;
///     }
///     if driver.callback(&x)? == Some(Action::StopEarly) {
///         break;
///     }
/// }
///
/// assert_eq!(driver.history().unwrap().len(), 50);
/// # Ok::<(), opt_tools_tasks::Error>(())
/// ```
pub struct Driver<O: Objective, C = ()> {
    context: Context<O>,
    tasks: Vec<Box<dyn Task<O>>>,
    chain: C,
    optimisation: Stopwatch,
    finished_at: Option<usize>,
}

impl<O: Objective> Driver<O> {
    /// Creates a driver with no tasks and no chained observer.
    pub fn new(objective: O) -> Self {
        Self {
            context: Context::new(objective),
            tasks: Vec::new(),
            chain: (),
            optimisation: Stopwatch::running(),
            finished_at: None,
        }
    }

    /// Creates a driver running the tasks described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn from_config(objective: O, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(objective).with_tasks(config.tasks()?))
    }
}

impl<O, C> Driver<O, C>
where
    O: Objective,
    C: for<'a> Observer<Step<'a>, Action>,
{
    /// Registers a task after the ones already present.
    #[must_use]
    pub fn with_task<T: Task<O> + 'static>(self, task: T) -> Self {
        self.with_tasks([Box::new(task) as Box<dyn Task<O>>])
    }

    /// Registers several tasks, in order, after the ones already present.
    #[must_use]
    pub fn with_tasks<I>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Task<O>>>,
    {
        for mut task in tasks {
            task.setup(&mut self.context);
            self.tasks.push(task);
        }
        self
    }

    /// Replaces the chained observer, which sees every step after the tasks.
    pub fn with_chain<C2>(self, chain: C2) -> Driver<O, C2>
    where
        C2: for<'a> Observer<Step<'a>, Action>,
    {
        Driver {
            context: self.context,
            tasks: self.tasks,
            chain,
            optimisation: self.optimisation,
            finished_at: self.finished_at,
        }
    }

    /// Handles one optimisation step.
    ///
    /// # Errors
    ///
    /// Returns an error if a task fails. The iteration still counts.
    pub fn callback(&mut self, x: &[f64]) -> Result<Option<Action>, Error> {
        self.step(x, false)
    }

    /// Handles one optimisation step, forcing every task to fire.
    ///
    /// # Errors
    ///
    /// Returns an error if a task fails.
    pub fn final_callback(&mut self, x: &[f64]) -> Result<Option<Action>, Error> {
        self.step(x, true)
    }

    /// Fires every task once at `x`, regardless of its schedule.
    ///
    /// The iteration counter is not incremented. Actions returned by tasks are
    /// ignored, since the run is already ending. Does nothing if the run was
    /// already finished at the current iteration, including by a stop request.
    ///
    /// # Errors
    ///
    /// Returns an error if a task fails.
    pub fn finish(&mut self, x: &[f64]) -> Result<(), Error> {
        if self.finished_at == Some(self.context.iteration()) {
            return Ok(());
        }
        let _paused = self.optimisation.pause()?;
        self.finished_at = Some(self.context.iteration());
        fire_all(&mut self.tasks, &mut self.context, x)
    }

    fn step(&mut self, x: &[f64], force: bool) -> Result<Option<Action>, Error> {
        let _paused = self.optimisation.pause()?;
        let iteration = self.context.increment();

        for index in 0..self.tasks.len() {
            let action = self.tasks[index].evaluate(&mut self.context, x, force)?;
            if action == Some(Action::StopEarly) {
                tracing::debug!(
                    iteration,
                    task = self.tasks[index].name(),
                    "task requested stop, finishing run"
                );
                self.finished_at = Some(iteration);
                fire_all(&mut self.tasks, &mut self.context, x)?;
                return Ok(action);
            }
        }

        Ok(self.chain.observe(&Step { iteration, x }))
    }
}

impl<O: Objective, C> Driver<O, C> {
    /// Returns the current iteration index.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.context.iteration()
    }

    /// Returns the wall-clock time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.context.elapsed()
    }

    /// Returns the time spent outside the callback, in the optimiser itself.
    #[must_use]
    pub fn optimisation_time(&self) -> Duration {
        self.optimisation.elapsed()
    }

    #[must_use]
    pub fn history(&self) -> Option<&History> {
        self.context.history()
    }

    #[must_use]
    pub fn context(&self) -> &Context<O> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<O> {
        &mut self.context
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Consumes the driver and returns its history table.
    #[must_use]
    pub fn into_history(mut self) -> Option<History> {
        self.context.take_history()
    }
}

fn fire_all<O: Objective>(
    tasks: &mut [Box<dyn Task<O>>],
    ctx: &mut Context<O>,
    x: &[f64],
) -> Result<(), Error> {
    for task in tasks {
        task.evaluate(ctx, x, true)?;
    }
    Ok(())
}

impl<O: Objective, C> fmt::Debug for Driver<O, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tasks.iter().map(|task| task.name()).collect();
        f.debug_struct("Driver")
            .field("iteration", &self.context.iteration())
            .field("tasks", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::Cell, rc::Rc};

    use opt_tools_core::objective;

    use crate::Schedule;

    /// Counts how often it fires; dormant unless forced.
    struct Counter {
        schedule: Schedule,
        fired: Rc<Cell<usize>>,
        action: Option<Action>,
    }

    impl Counter {
        fn dormant(fired: &Rc<Cell<usize>>) -> Self {
            Self {
                schedule: Schedule::dormant(crate::Trigger::Iteration),
                fired: Rc::clone(fired),
                action: None,
            }
        }
    }

    impl<O: Objective> Task<O> for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn schedule(&self) -> &Schedule {
            &self.schedule
        }

        fn schedule_mut(&mut self) -> &mut Schedule {
            &mut self.schedule
        }

        fn fire(&mut self, _ctx: &mut Context<O>, _x: &[f64]) -> Result<Option<Action>, Error> {
            self.fired.set(self.fired.get() + 1);
            Ok(self.action)
        }
    }

    fn sum() -> impl Objective {
        objective::value(|x: &[f64]| x.iter().sum())
    }

    #[test]
    fn callback_increments_iteration() {
        let mut driver = Driver::new(sum());

        driver.callback(&[1.0]).unwrap();
        driver.callback(&[1.0]).unwrap();

        assert_eq!(driver.iteration(), 2);
    }

    #[test]
    fn finish_forces_every_task_once() {
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let mut driver = Driver::new(sum())
            .with_task(Counter::dormant(&a))
            .with_task(Counter::dormant(&b));

        driver.callback(&[0.0]).unwrap();
        assert_eq!((a.get(), b.get()), (0, 0));

        driver.finish(&[0.0]).unwrap();
        assert_eq!((a.get(), b.get()), (1, 1));
        assert_eq!(driver.iteration(), 1);
    }

    #[test]
    fn final_callback_counts_and_forces() {
        let fired = Rc::new(Cell::new(0));
        let mut driver = Driver::new(sum()).with_task(Counter::dormant(&fired));

        driver.final_callback(&[0.0]).unwrap();

        assert_eq!(fired.get(), 1);
        assert_eq!(driver.iteration(), 1);
    }

    #[test]
    fn stop_request_finishes_and_skips_chain() {
        let before = Rc::new(Cell::new(0));
        let after = Rc::new(Cell::new(0));
        let chained = Rc::new(Cell::new(0));

        let mut stopper = Counter::dormant(&before);
        stopper.schedule = Schedule::iterations([1.0]);
        stopper.action = Some(Action::StopEarly);

        let seen = Rc::clone(&chained);
        let mut driver = Driver::new(sum())
            .with_task(stopper)
            .with_task(Counter::dormant(&after))
            .with_chain(move |_: &Step<'_>| {
                seen.set(seen.get() + 1);
                None
            });

        let action = driver.callback(&[0.0]).unwrap();

        assert_eq!(action, Some(Action::StopEarly));
        // Once on schedule, once more from the finish.
        assert_eq!(before.get(), 2);
        assert_eq!(after.get(), 1);
        assert_eq!(chained.get(), 0);
    }

    #[test]
    fn finish_after_a_stop_request_fires_nothing() {
        let fired = Rc::new(Cell::new(0));
        let mut stopper = Counter::dormant(&fired);
        stopper.schedule = Schedule::iterations([2.0]);
        stopper.action = Some(Action::StopEarly);
        let mut driver = Driver::new(sum()).with_task(stopper);

        assert_eq!(driver.callback(&[0.0]).unwrap(), None);
        assert_eq!(driver.callback(&[0.0]).unwrap(), Some(Action::StopEarly));
        assert_eq!(fired.get(), 2);

        driver.finish(&[0.0]).unwrap();
        driver.finish(&[0.0]).unwrap();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn finish_runs_again_after_further_steps() {
        let fired = Rc::new(Cell::new(0));
        let mut driver = Driver::new(sum()).with_task(Counter::dormant(&fired));

        driver.callback(&[0.0]).unwrap();
        driver.finish(&[0.0]).unwrap();
        driver.callback(&[0.0]).unwrap();
        driver.finish(&[0.0]).unwrap();

        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn chained_observer_sees_each_step() {
        let mut iterations = Vec::new();
        let mut driver = Driver::new(sum()).with_chain(|step: &Step<'_>| {
            iterations.push(step.iteration);
            (step.iteration == 3).then_some(Action::StopEarly)
        });

        assert_eq!(driver.callback(&[0.0]).unwrap(), None);
        assert_eq!(driver.callback(&[0.0]).unwrap(), None);
        assert_eq!(driver.callback(&[0.0]).unwrap(), Some(Action::StopEarly));
        drop(driver);

        assert_eq!(iterations, vec![1, 2, 3]);
    }

    #[test]
    fn optimisation_clock_keeps_running_between_steps() {
        let mut driver = Driver::new(sum());

        driver.callback(&[0.0]).unwrap();

        assert!(driver.optimisation_time() <= driver.elapsed());
        assert!(driver.optimisation.is_running());
    }
}
