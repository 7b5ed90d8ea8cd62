use std::error::Error as StdError;

use thiserror::Error;

use opt_tools_core::{HistoryError, SequenceError, StopwatchError};

/// Errors that can occur while running tasks from the optimisation callback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("objective error: {0}")]
    Objective(#[source] Box<dyn StdError + Send + Sync>),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Stopwatch(#[from] StopwatchError),

    #[error("progress output failed")]
    Output(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn objective<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Objective(Box::new(err))
    }
}

/// Errors that can occur when constructing tasks or validating a [`Config`].
///
/// [`Config`]: crate::Config
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("a store schedule needs a `store_path` to write the history file")]
    MissingStorePath,

    #[error("store path must not be empty")]
    EmptyStorePath,

    #[error("timeout must be non-negative, got {0}")]
    Timeout(f64),

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}
