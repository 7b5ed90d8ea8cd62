use std::time::Duration;

use opt_tools_core::{Evaluation, History, Objective, Stopwatch};

use crate::{Error, Trigger};

/// Shared state of one optimisation run, passed to every task.
///
/// Holds the iteration counter, the run clock, the objective with a one-entry
/// evaluation cache, and the history table once a logging task creates it.
#[derive(Debug)]
pub struct Context<O> {
    iteration: usize,
    clock: Stopwatch,
    objective: O,
    memo: Option<(Vec<f64>, Evaluation)>,
    history: Option<History>,
}

impl<O: Objective> Context<O> {
    /// Creates a context at iteration zero with its clock running.
    pub fn new(objective: O) -> Self {
        Self {
            iteration: 0,
            clock: Stopwatch::running(),
            objective,
            memo: None,
            history: None,
        }
    }

    /// Returns the current iteration index.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Returns the wall-clock time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Returns progress measured in the units of `trigger`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, trigger: Trigger) -> f64 {
        match trigger {
            Trigger::Iteration => self.iteration as f64,
            Trigger::Time => self.elapsed().as_secs_f64(),
        }
    }

    #[must_use]
    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn objective_mut(&mut self) -> &mut O {
        &mut self.objective
    }

    /// Evaluates the objective at `x`, reusing the last result if `x` is unchanged.
    ///
    /// Vectors are compared bit for bit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Objective`] if the objective fails.
    pub fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Error> {
        if let Some((seen, evaluation)) = &self.memo {
            if same_bits(seen, x) {
                return Ok(evaluation.clone());
            }
        }

        let evaluation = self.objective.evaluate(x).map_err(Error::objective)?;
        self.memo = Some((x.to_vec(), evaluation.clone()));
        Ok(evaluation)
    }

    /// Returns the named parameter values at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Objective`] if the objective fails.
    pub fn parameter_values(&mut self, x: &[f64]) -> Result<Vec<f64>, Error> {
        self.objective.parameter_values(x).map_err(Error::objective)
    }

    #[must_use]
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut History> {
        self.history.as_mut()
    }

    /// Installs a fresh history table, replacing any existing one.
    pub fn set_history(&mut self, history: History) {
        self.history = Some(history);
    }

    /// Installs a previously persisted table and continues from its last row.
    ///
    /// The iteration counter and the run clock are reseeded from the last
    /// row's `i` and `t`, so the next logged row is numbered `i + 1` and
    /// elapsed time keeps counting from `t`.
    pub fn resume_from(&mut self, history: History) {
        if let Some(last) = history.last() {
            self.iteration = last.i;
            let elapsed = Duration::try_from_secs_f64(last.t).unwrap_or_default();
            self.clock = Stopwatch::running();
            self.clock.add_time(elapsed);
        }
        self.history = Some(history);
    }

    /// Removes and returns the history table.
    pub fn take_history(&mut self) -> Option<History> {
        self.history.take()
    }

    pub(crate) fn increment(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }
}

fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(p, q)| p.to_bits() == q.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::Cell, rc::Rc};

    use approx::assert_relative_eq;
    use opt_tools_core::{Record, Schema, objective};

    fn counting_objective(
        calls: Rc<Cell<usize>>,
    ) -> impl Objective<Error = std::convert::Infallible> {
        objective::combined(move |x: &[f64]| {
            calls.set(calls.get() + 1);
            (
                x.iter().map(|v| v * v).sum(),
                x.iter().map(|v| 2.0 * v).collect(),
            )
        })
    }

    #[test]
    fn evaluate_reuses_result_for_same_x() {
        let calls = Rc::new(Cell::new(0));
        let mut ctx = Context::new(counting_objective(Rc::clone(&calls)));

        let first = ctx.evaluate(&[1.0, 2.0]).unwrap();
        let second = ctx.evaluate(&[1.0, 2.0]).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_relative_eq!(first.f, 5.0);
    }

    #[test]
    fn evaluate_recomputes_when_any_bit_changes() {
        let calls = Rc::new(Cell::new(0));
        let mut ctx = Context::new(counting_objective(Rc::clone(&calls)));

        ctx.evaluate(&[0.0, 1.0]).unwrap();
        ctx.evaluate(&[-0.0, 1.0]).unwrap();
        ctx.evaluate(&[-0.0, 1.0, 0.0]).unwrap();

        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn progress_follows_trigger_units() {
        let mut ctx = Context::new(counting_objective(Rc::default()));
        ctx.increment();
        ctx.increment();

        assert_relative_eq!(ctx.progress(Trigger::Iteration), 2.0);
        assert!(ctx.progress(Trigger::Time) >= 0.0);
    }

    #[test]
    fn resume_reseeds_counter_and_clock() {
        let mut history = History::new(Schema::Default);
        for i in 1..=5 {
            #[allow(clippy::cast_precision_loss)]
            let t = 100.0 + i as f64;
            history
                .push(Record {
                    i,
                    t,
                    f: 1.0,
                    gnorm: 0.0,
                    g: None,
                    x: None,
                    params: Vec::new(),
                    extra: Vec::new(),
                })
                .unwrap();
        }

        let mut ctx = Context::new(counting_objective(Rc::default()));
        ctx.resume_from(history);

        assert_eq!(ctx.iteration(), 5);
        assert!(ctx.elapsed() >= Duration::from_secs(105));
        assert_eq!(ctx.increment(), 6);
        assert_eq!(ctx.history().map(History::len), Some(5));
    }
}
