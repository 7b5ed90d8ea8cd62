use std::fmt;

use opt_tools_core::{Action, Evaluation, History, Objective, Record, Schema};

use crate::{Context, Error, Schedule, Task};

/// Appends one row per firing to the context's history table.
///
/// The first logger to fire creates the table. Its schema is
/// [`Schema::Parameters`] when the objective reports named parameters, and
/// [`Schema::Default`] otherwise.
///
/// A logger built with [`HistoryLogger::resume_from`] instead installs the
/// given table when it is registered with a driver, continuing the iteration
/// count and run clock from its last row.
///
/// Extra columns, such as held-out benchmark scores, are added with
/// [`HistoryLogger::with_metric`] and follow the schema's columns.
///
/// Firing twice at the same iteration adds a single row.
#[derive(Debug)]
pub struct HistoryLogger {
    schedule: Schedule,
    resume: Option<History>,
    store_gradient: bool,
    store_x: bool,
    metrics: Vec<Metric>,
}

/// A named extra column computed from the parameters and their evaluation.
struct Metric {
    name: String,
    compute: Box<dyn FnMut(&[f64], &Evaluation) -> f64>,
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.name).finish()
    }
}

impl HistoryLogger {
    #[must_use]
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            resume: None,
            store_gradient: false,
            store_x: false,
            metrics: Vec::new(),
        }
    }

    /// Continues logging into a previously persisted table.
    #[must_use]
    pub fn resume_from(mut self, history: History) -> Self {
        self.resume = Some(history);
        self
    }

    /// Keeps the full gradient in each row.
    #[must_use]
    pub fn store_gradient(mut self, store: bool) -> Self {
        self.store_gradient = store;
        self
    }

    /// Adds an extra column, filled by `compute` each time a row is logged.
    ///
    /// A resumed table must already carry the same extra columns.
    #[must_use]
    pub fn with_metric<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: FnMut(&[f64], &Evaluation) -> f64 + 'static,
    {
        self.metrics.push(Metric {
            name: name.into(),
            compute: Box::new(compute),
        });
        self
    }

    /// Keeps the parameter vector in each row (default schema only).
    #[must_use]
    pub fn store_x(mut self, store: bool) -> Self {
        self.store_x = store;
        self
    }
}

impl<O: Objective> Task<O> for HistoryLogger {
    fn name(&self) -> &'static str {
        "history"
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn setup(&mut self, ctx: &mut Context<O>) {
        let Some(history) = self.resume.take() else {
            return;
        };
        if ctx.history().is_some() {
            tracing::warn!("history already installed, ignoring table to resume from");
            return;
        }
        tracing::info!(
            rows = history.len(),
            last_iteration = history.last_iteration(),
            "resuming history"
        );
        ctx.resume_from(history);
    }

    fn fire(&mut self, ctx: &mut Context<O>, x: &[f64]) -> Result<Option<Action>, Error> {
        if ctx.history().is_none() {
            let schema = match ctx.objective().parameter_names() {
                Some(names) => Schema::Parameters(names),
                None => Schema::Default,
            };
            let extra = self.metrics.iter().map(|m| m.name.clone()).collect();
            ctx.set_history(History::with_extra_columns(schema, extra));
        }

        let iteration = ctx.iteration();
        let with_parameters = match ctx.history() {
            Some(history) if history.last_iteration() == Some(iteration) => return Ok(None),
            Some(history) => matches!(history.schema(), Schema::Parameters(_)),
            None => false,
        };

        let evaluation = ctx.evaluate(x)?;
        let params = if with_parameters {
            ctx.parameter_values(x)?
        } else {
            Vec::new()
        };

        let t = ctx.elapsed().as_secs_f64();
        let extra = self
            .metrics
            .iter_mut()
            .map(|m| (m.compute)(x, &evaluation))
            .collect();

        let record = Record {
            i: iteration,
            t,
            f: evaluation.f,
            gnorm: evaluation.gradient_norm(),
            g: self.store_gradient.then_some(evaluation.g),
            x: (self.store_x && !with_parameters).then(|| x.to_vec()),
            params,
            extra,
        };
        if let Some(history) = ctx.history_mut() {
            history.push(record)?;
        }
        Ok(None)
    }
}
