use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use opt_tools_core::{ExpLin, Objective};

use crate::{
    ConfigError, HistoryLogger, HistoryStore, ProgressPrinter, Schedule, Task, Timeout, Trigger,
};

/// Serializable description of an [`ExpLin`] schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub growth: f64,

    /// Largest gap between thresholds; `None` lets gaps grow without bound.
    pub max_gap: Option<f64>,

    pub start: f64,

    /// First gap; defaults to `start`.
    pub start_jump: Option<f64>,

    /// Defaults to the trigger of the task the schedule is used for.
    pub trigger: Option<Trigger>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            growth: 1.5,
            max_gap: Some(1000.0),
            start: 1.0,
            start_jump: None,
            trigger: None,
        }
    }
}

impl ScheduleConfig {
    /// Builds the schedule, using `trigger` unless one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Sequence`] if the sequence parameters are invalid.
    pub fn build(&self, trigger: Trigger) -> Result<Schedule, ConfigError> {
        let sequence = ExpLin::with_start(
            self.growth,
            self.max_gap.unwrap_or(f64::INFINITY),
            self.start,
            self.start_jump.unwrap_or(self.start),
        )?;
        Ok(Schedule::new(sequence, self.trigger.unwrap_or(trigger)))
    }
}

/// Declarative setup of the standard task list.
///
/// Produces, in order: a [`ProgressPrinter`], a [`HistoryLogger`], a
/// [`HistoryStore`], and a [`Timeout`], each only when configured. Display and
/// history schedules default to the iteration trigger; the store schedule
/// defaults to the time trigger.
///
/// # Example
///
/// ```
/// use opt_tools_tasks::Config;
///
/// let config: Config = serde_json::from_str(r#"{
///     "store": {"growth": 1.0, "max_gap": null, "start": 5.0},
///     "store_path": "opthist.json",
///     "timeout": 3600.0,
///     "store_x": true
/// }"#).unwrap();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Progress printing schedule.
    pub display: Option<ScheduleConfig>,

    /// History logging schedule.
    pub history: Option<ScheduleConfig>,

    /// History persistence schedule; requires `store_path`.
    pub store: Option<ScheduleConfig>,

    pub store_path: Option<PathBuf>,

    /// Seconds after which the run is stopped.
    pub timeout: Option<f64>,

    pub store_gradient: bool,

    pub store_x: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: Some(ScheduleConfig::default()),
            history: Some(ScheduleConfig::default()),
            store: None,
            store_path: None,
            timeout: None,
            store_gradient: false,
            store_x: false,
        }
    }
}

impl Config {
    /// Checks the configuration without building any tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if a schedule is invalid, a store schedule has no
    /// path, or the timeout is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tasks::<NeverEvaluated>().map(|_| ())
    }

    /// Builds the configured tasks in their standard order.
    ///
    /// # Errors
    ///
    /// See [`Config::validate`].
    pub fn tasks<O: Objective>(&self) -> Result<Vec<Box<dyn Task<O>>>, ConfigError> {
        let mut tasks: Vec<Box<dyn Task<O>>> = Vec::new();

        if let Some(display) = &self.display {
            tasks.push(Box::new(ProgressPrinter::new(
                display.build(Trigger::Iteration)?,
            )));
        }

        if let Some(history) = &self.history {
            let logger = HistoryLogger::new(history.build(Trigger::Iteration)?)
                .store_gradient(self.store_gradient)
                .store_x(self.store_x);
            tasks.push(Box::new(logger));
        }

        if let Some(store) = &self.store {
            let path = self.store_path.clone().ok_or(ConfigError::MissingStorePath)?;
            tasks.push(Box::new(HistoryStore::new(
                path,
                store.build(Trigger::Time)?,
            )?));
        }

        if let Some(seconds) = self.timeout {
            tasks.push(Box::new(Timeout::new(seconds)?));
        }

        Ok(tasks)
    }
}

/// Objective type used only to check that tasks can be built.
struct NeverEvaluated;

impl Objective for NeverEvaluated {
    type Error = std::convert::Infallible;

    fn evaluate(&mut self, _x: &[f64]) -> Result<opt_tools_core::Evaluation, Self::Error> {
        Ok(opt_tools_core::Evaluation {
            f: f64::NAN,
            g: Vec::new(),
        })
    }
}
