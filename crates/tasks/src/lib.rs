//! Scheduled instrumentation tasks for iterative optimisation loops.
//!
//! An external optimiser calls [`Driver::callback`] once per step with its
//! current parameter vector. The driver keeps the shared [`Context`]
//! (iteration counter, run clock, cached objective evaluation, history table)
//! and runs each registered [`Task`] whose [`Schedule`] is due.
//!
//! # Tasks
//!
//! - [`ProgressPrinter`] — one overwritten progress line on the console
//! - [`HistoryLogger`] — appends rows to the history table
//! - [`HistoryStore`] — persists the history table to disk
//! - [`Timeout`] — stops the run after a time or iteration limit
//!
//! Task lists can also be built declaratively from a [`Config`].

mod config;
mod context;
mod driver;
mod error;
mod schedule;
mod task;

pub use config::{Config, ScheduleConfig};
pub use context::Context;
pub use driver::Driver;
pub use error::{ConfigError, Error};
pub use schedule::{Schedule, Trigger};
pub use task::{HistoryLogger, HistoryStore, ProgressPrinter, Task, Timeout};
