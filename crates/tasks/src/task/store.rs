use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use opt_tools_core::{Action, Objective};

use crate::{ConfigError, Context, Error, Schedule, Task};

/// Writes the context's history table to a file, replacing earlier versions.
///
/// Store tasks are usually time-triggered on a sparse schedule. Firing before
/// any history table exists logs a warning and writes nothing, so a store may
/// be registered ahead of the logger that creates the table.
#[derive(Debug)]
pub struct HistoryStore {
    schedule: Schedule,
    path: PathBuf,
    verbose: bool,
}

impl HistoryStore {
    /// Creates a store that writes to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyStorePath`] if `path` is empty.
    pub fn new(path: impl Into<PathBuf>, schedule: Schedule) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }
        Ok(Self {
            schedule,
            path,
            verbose: false,
        })
    }

    /// Reports how long each write took at `info` level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<O: Objective> Task<O> for HistoryStore {
    fn name(&self) -> &'static str {
        "store"
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn fire(&mut self, ctx: &mut Context<O>, _x: &[f64]) -> Result<Option<Action>, Error> {
        let Some(history) = ctx.history() else {
            tracing::warn!(
                path = %self.path.display(),
                "no history to store yet, register a logger before the store"
            );
            return Ok(None);
        };

        let started = Instant::now();
        history.save(&self.path)?;
        let seconds = started.elapsed().as_secs_f64();

        let rows = history.len();
        if self.verbose {
            tracing::info!(path = %self.path.display(), rows, "stored history in {seconds:.2}s");
        } else {
            tracing::debug!(path = %self.path.display(), rows, seconds, "stored history");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use opt_tools_core::{History, Record, Schema, every_iteration, objective};

    fn ctx() -> Context<impl Objective> {
        Context::new(objective::value(|x: &[f64]| x.iter().sum()))
    }

    #[test]
    fn rejects_empty_path() {
        let result = HistoryStore::new("", Schedule::seconds(every_iteration()));

        assert_eq!(result.unwrap_err(), ConfigError::EmptyStorePath);
    }

    #[test]
    fn without_history_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::new(&path, Schedule::iterations(every_iteration())).unwrap();
        let mut ctx = ctx();

        let action = store.evaluate(&mut ctx, &[0.0], true).unwrap();

        assert_eq!(action, None);
        assert!(!path.exists());
    }

    #[test]
    fn writes_current_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::new(&path, Schedule::iterations(every_iteration()))
            .unwrap()
            .verbose(true);
        let mut ctx = ctx();

        let mut history = History::new(Schema::Default);
        history
            .push(Record {
                i: 1,
                t: 0.25,
                f: 2.0,
                gnorm: 0.0,
                g: None,
                x: Some(vec![1.0, 1.0]),
                params: Vec::new(),
                extra: Vec::new(),
            })
            .unwrap();
        ctx.set_history(history.clone());

        ctx.increment();
        store.evaluate(&mut ctx, &[1.0, 1.0], false).unwrap();

        assert_eq!(History::load(&path).unwrap(), history);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("history.json");
        let mut store = HistoryStore::new(path, Schedule::iterations(every_iteration())).unwrap();
        let mut ctx = ctx();
        ctx.set_history(History::new(Schema::Default));

        let result = store.evaluate(&mut ctx, &[0.0], true);

        assert!(matches!(result, Err(Error::History(_))));
    }
}
