use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors that can occur when starting or stopping a [`Stopwatch`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchError {
    #[error("stopwatch can not be started unless it is stopped")]
    AlreadyRunning,

    #[error("stopwatch can not be stopped unless it is running")]
    NotRunning,
}

/// Accumulates wall-clock time across any number of start/stop intervals.
///
/// A stopwatch starts out stopped. Reading [`Stopwatch::elapsed`] never
/// changes its state, whether it is running or not.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    /// Creates a stopped stopwatch with no accumulated time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stopped stopwatch that already holds `elapsed`.
    #[must_use]
    pub fn with_elapsed(elapsed: Duration) -> Self {
        Self {
            started: None,
            elapsed,
        }
    }

    /// Creates a stopwatch that is already running.
    #[must_use]
    pub fn running() -> Self {
        Self {
            started: Some(Instant::now()),
            elapsed: Duration::ZERO,
        }
    }

    /// Starts accumulating time.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::AlreadyRunning`] if the stopwatch is running.
    pub fn start(&mut self) -> Result<(), StopwatchError> {
        if self.started.is_some() {
            return Err(StopwatchError::AlreadyRunning);
        }
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Stops accumulating time, keeping what has been gathered so far.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NotRunning`] if the stopwatch is stopped.
    pub fn stop(&mut self) -> Result<(), StopwatchError> {
        let started = self.started.take().ok_or(StopwatchError::NotRunning)?;
        self.elapsed += started.elapsed();
        Ok(())
    }

    /// Adds `time` to the accumulated total.
    pub fn add_time(&mut self, time: Duration) {
        self.elapsed += time;
    }

    /// Returns `true` while the stopwatch is accumulating time.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Returns the accumulated time, including the current interval if running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.elapsed + started.elapsed(),
            None => self.elapsed,
        }
    }

    /// Stops the stopwatch until the returned guard is dropped.
    ///
    /// The guard restarts the stopwatch on every exit path, including early
    /// returns and unwinding.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NotRunning`] if the stopwatch is stopped.
    pub fn pause(&mut self) -> Result<Paused<'_>, StopwatchError> {
        self.stop()?;
        Ok(Paused { watch: self })
    }
}

/// Guard returned by [`Stopwatch::pause`]; restarts the stopwatch on drop.
#[derive(Debug)]
pub struct Paused<'a> {
    watch: &'a mut Stopwatch,
}

impl Paused<'_> {
    /// Returns the time accumulated before the pause began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.watch.elapsed
    }
}

impl Drop for Paused<'_> {
    fn drop(&mut self) {
        self.watch.started = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{panic, thread};

    #[test]
    fn start_twice_is_an_error() {
        let mut watch = Stopwatch::new();
        watch.start().unwrap();

        assert_eq!(watch.start(), Err(StopwatchError::AlreadyRunning));
        assert!(watch.is_running());
    }

    #[test]
    fn stop_while_stopped_is_an_error() {
        let mut watch = Stopwatch::with_elapsed(Duration::from_secs(3));

        assert_eq!(watch.stop(), Err(StopwatchError::NotRunning));
        assert_eq!(watch.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn stopped_watch_does_not_advance() {
        let mut watch = Stopwatch::running();
        thread::sleep(Duration::from_millis(2));
        watch.stop().unwrap();

        let frozen = watch.elapsed();
        thread::sleep(Duration::from_millis(2));

        assert!(frozen >= Duration::from_millis(2));
        assert_eq!(watch.elapsed(), frozen);
    }

    #[test]
    fn add_time_accumulates() {
        let mut watch = Stopwatch::new();
        watch.add_time(Duration::from_millis(1500));
        watch.add_time(Duration::from_millis(500));

        assert_eq!(watch.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn pause_excludes_scope_and_restarts() {
        let mut watch = Stopwatch::running();
        {
            let paused = watch.pause().unwrap();
            let before = paused.elapsed();
            thread::sleep(Duration::from_millis(5));
            assert_eq!(paused.elapsed(), before);
        }

        assert!(watch.is_running());
        assert!(watch.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn pause_requires_running_watch() {
        let mut watch = Stopwatch::new();

        assert!(matches!(watch.pause(), Err(StopwatchError::NotRunning)));
    }

    #[test]
    fn pause_restarts_after_unwinding() {
        let mut watch = Stopwatch::running();

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let _paused = watch.pause().unwrap();
            panic!("task failed");
        }));

        assert!(result.is_err());
        assert!(watch.is_running());
    }
}
