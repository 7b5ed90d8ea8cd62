//! Core types for instrumenting an iterative optimisation loop.
//!
//! This crate defines the leaf building blocks that scheduled tasks and the
//! driver build on:
//!
//! - [`ExpLin`] — a self-adjusting sequence of trigger thresholds
//! - [`Stopwatch`] — an elapsed-time tracker that can be paused
//! - [`History`] — an append-only table of per-iteration records
//! - [`Objective`], [`Model`] — evaluators of the objective and its gradient
//! - [`Observer`] — receives iteration events and optionally returns an [`Action`]

mod action;
pub mod history;
pub mod objective;
mod observer;
mod sequence;
mod stopwatch;

pub use action::{Action, Step};
pub use history::{History, HistoryError, Record, Schema};
pub use objective::{Evaluation, Model, ModelObjective, Objective};
pub use observer::Observer;
pub use sequence::{ExpLin, SequenceError, every_iteration, seq_exp_lin};
pub use stopwatch::{Paused, Stopwatch, StopwatchError};
