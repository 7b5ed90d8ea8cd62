//! Append-only history of optimisation progress.
//!
//! A [`History`] holds one [`Record`] per logged iteration. Its columns are
//! fixed when the table is created, by a [`Schema`]:
//!
//! - [`Schema::Default`] — `i, t, f, gnorm, g, x`
//! - [`Schema::Parameters`] — `i, t, f, gnorm, g` followed by one column per
//!   named model parameter
//!
//! Either layout may end with extra metric columns, such as benchmark scores
//! computed alongside the objective.
//!
//! Tables serialize to JSON as
//! `{"columns": [...], "layout": ..., "extra_columns": n, "rows": [...]}` and
//! can be loaded back to resume logging or for offline analysis. The layout
//! tag keeps a model parameter named `x` from being read as the default
//! layout; files without it are classified from their columns.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metric columns shared by every schema, in order.
pub const METRIC_COLUMNS: [&str; 5] = ["i", "t", "f", "gnorm", "g"];

/// Errors that can occur when appending to, saving, or loading a [`History`].
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("row for iteration {i} can not follow iteration {last}")]
    OutOfOrder { i: usize, last: usize },

    #[error("expected {expected} parameter values, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("expected {expected} extra metric values, got {actual}")]
    ExtraCount { expected: usize, actual: usize },

    #[error("stored history repeats iteration {0}")]
    Duplicate(usize),

    #[error("unrecognised history columns: {0:?}")]
    Columns(Vec<String>),

    #[error("history i/o failed")]
    Io(#[from] std::io::Error),

    #[error("history encoding failed")]
    Json(#[from] serde_json::Error),
}

/// The column layout of a [`History`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Metric columns followed by the full parameter vector `x`.
    Default,

    /// Metric columns followed by one column per named model parameter.
    Parameters(Vec<String>),
}

impl Schema {
    /// Returns the column names in order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let metrics = METRIC_COLUMNS.iter().map(ToString::to_string);
        match self {
            Self::Default => metrics.chain(std::iter::once("x".to_string())).collect(),
            Self::Parameters(names) => metrics.chain(names.iter().cloned()).collect(),
        }
    }

    /// Splits stored columns into a schema and the trailing extra columns.
    fn from_columns(
        columns: Vec<String>,
        layout: Option<Layout>,
        extra: usize,
    ) -> Result<(Self, Vec<String>), HistoryError> {
        let metrics_match = columns.len() >= METRIC_COLUMNS.len()
            && columns.len() - METRIC_COLUMNS.len() >= extra
            && columns.iter().zip(METRIC_COLUMNS).all(|(c, m)| c == m);
        if !metrics_match {
            return Err(HistoryError::Columns(columns));
        }

        let rest = &columns[METRIC_COLUMNS.len()..];
        let (body, extra) = rest.split_at(rest.len() - extra);
        let is_default = body.len() == 1 && body[0] == "x";
        let schema = match layout {
            Some(Layout::Default) if is_default => Self::Default,
            Some(Layout::Default) => return Err(HistoryError::Columns(columns)),
            Some(Layout::Parameters) => Self::Parameters(body.to_vec()),
            None if is_default => Self::Default,
            None => Self::Parameters(body.to_vec()),
        };
        Ok((schema, extra.to_vec()))
    }

    fn layout(&self) -> Layout {
        match self {
            Self::Default => Layout::Default,
            Self::Parameters(_) => Layout::Parameters,
        }
    }

    fn parameter_count(&self) -> usize {
        match self {
            Self::Default => 0,
            Self::Parameters(names) => names.len(),
        }
    }
}

/// One logged iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Iteration index.
    pub i: usize,

    /// Seconds elapsed since the run started.
    pub t: f64,

    /// Objective value.
    pub f: f64,

    /// Euclidean norm of the gradient.
    pub gnorm: f64,

    /// Full gradient, when requested.
    pub g: Option<Vec<f64>>,

    /// Parameter vector, when requested (default schema only).
    #[serde(default)]
    pub x: Option<Vec<f64>>,

    /// Named parameter values in schema order (parameter schema only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,

    /// Extra metric values in column order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<f64>,
}

/// Ordered, append-only table of [`Record`]s.
///
/// Rows are ordered by non-decreasing iteration, and at most one row is kept
/// per iteration: appending a second row for the last iteration is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Stored", into = "Stored")]
pub struct History {
    schema: Schema,
    extra: Vec<String>,
    rows: Vec<Record>,
}

/// On-disk shape of a [`History`].
#[derive(Serialize, Deserialize)]
struct Stored {
    columns: Vec<String>,
    #[serde(default)]
    layout: Option<Layout>,
    #[serde(default)]
    extra_columns: usize,
    rows: Vec<Record>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Layout {
    Default,
    Parameters,
}

impl History {
    /// Creates an empty table with the given schema.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self::with_extra_columns(schema, Vec::new())
    }

    /// Creates an empty table whose rows also carry the named extra metrics.
    #[must_use]
    pub fn with_extra_columns(schema: Schema, extra: Vec<String>) -> Self {
        Self {
            schema,
            extra,
            rows: Vec::new(),
        }
    }

    /// Returns the schema fixed at creation.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the names of the extra metric columns.
    #[must_use]
    pub fn extra_columns(&self) -> &[String] {
        &self.extra
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self.schema.columns();
        columns.extend(self.extra.iter().cloned());
        columns
    }

    /// Returns all rows in iteration order.
    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the most recent row, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Record> {
        self.rows.last()
    }

    /// Returns the iteration index of the most recent row, if any.
    #[must_use]
    pub fn last_iteration(&self) -> Option<usize> {
        self.last().map(|row| row.i)
    }

    /// Returns the parameter vector of the most recent row that stored one.
    ///
    /// This is the last known-good state to fall back to after a run is
    /// stopped early.
    #[must_use]
    pub fn last_x(&self) -> Option<&[f64]> {
        self.rows.iter().rev().find_map(|row| row.x.as_deref())
    }

    /// Appends a row, returning `false` if a row for its iteration already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the row's iteration precedes the last row's, or if
    /// its parameter or extra metric values do not match the table.
    pub fn push(&mut self, record: Record) -> Result<bool, HistoryError> {
        if let Some(last) = self.last_iteration() {
            if record.i == last {
                return Ok(false);
            }
            if record.i < last {
                return Err(HistoryError::OutOfOrder { i: record.i, last });
            }
        }

        let expected = self.schema.parameter_count();
        if record.params.len() != expected {
            return Err(HistoryError::ParameterCount {
                expected,
                actual: record.params.len(),
            });
        }
        if record.extra.len() != self.extra.len() {
            return Err(HistoryError::ExtraCount {
                expected: self.extra.len(),
                actual: record.extra.len(),
            });
        }

        self.rows.push(record);
        Ok(true)
    }

    /// Writes the table as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), HistoryError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Reads a table previously written by [`History::to_writer`].
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails, or if the stored columns
    /// or rows violate the table invariants.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, HistoryError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Replaces the file at `path` with the serialized table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a table from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl TryFrom<Stored> for History {
    type Error = HistoryError;

    fn try_from(stored: Stored) -> Result<Self, Self::Error> {
        let (schema, extra) =
            Schema::from_columns(stored.columns, stored.layout, stored.extra_columns)?;
        let mut history = History::with_extra_columns(schema, extra);
        for row in stored.rows {
            let i = row.i;
            if !history.push(row)? {
                return Err(HistoryError::Duplicate(i));
            }
        }
        Ok(history)
    }
}

impl From<History> for Stored {
    fn from(history: History) -> Self {
        Self {
            columns: history.columns(),
            layout: Some(history.schema.layout()),
            extra_columns: history.extra.len(),
            rows: history.rows,
        }
    }
}
