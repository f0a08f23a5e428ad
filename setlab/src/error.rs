//! Error-handling module for the crate

use std::{path::PathBuf, process::ExitStatus, time::Duration};

use thiserror::Error;

use crate::{probability::ModelError, tables::Shape};

/// Error-Collection for all the possible Errors occurring in this crate
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// The generator executable could not be started
    #[error("Failed to start generator \"{executable}\": {error}")]
    GeneratorSpawn {
        /// Underlying IO error
        error: std::io::Error,
        /// Executable that was invoked
        executable: PathBuf,
    },
    /// The generator exited with a non-zero status
    #[error("Error running generator ({status}): {stderr}")]
    GeneratorFailed {
        /// Exit status of the child process
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },
    /// The report was not complete after the generator exited
    #[error("Report \"{path}\" was not written completely within {waited:?}")]
    ReportNotReady {
        /// Expected location of the report
        path: PathBuf,
        /// Time spent waiting for the report
        waited: Duration,
    },
    /// Errors on reading a file
    #[error("Failed to read \"{filename}\": {error}.")]
    IOReading {
        /// Contains the wrapped error
        error: std::io::Error,
        /// Filename which caused the error
        filename: PathBuf,
    },
    /// Error during a Write operation
    #[error("Failed to write \"{filename}\": {error}")]
    IOWriting {
        /// Underlying IO error
        error: std::io::Error,
        /// Name of the file that could not be written
        filename: PathBuf,
    },
    /// A marker line of the report is absent
    #[error("report does not contain the line \"{marker}\"")]
    MissingMarker {
        /// The literal marker that was searched for
        marker: &'static str,
    },
    /// The line expected below a marker does not exist
    #[error("report ends before line {line} expected after \"{marker}\"")]
    MissingLine {
        /// The marker the line belongs to
        marker: &'static str,
        /// One-based line number that is missing
        line: usize,
    },
    /// A numeric token could not be parsed
    #[error("invalid number \"{token}\" in report line {line}")]
    InvalidNumber {
        /// The offending token
        token: String,
        /// One-based line number
        line: usize,
    },
    /// Number of SET counts differs from the announced number of tables
    #[error("report announces {expected} tables but lists {found} SET counts")]
    CountMismatch {
        /// Number of tables in the header
        expected: usize,
        /// Number of counts found
        found: usize,
    },
    /// Reconstructed tables do not have the announced dimensions
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape announced by the header
        expected: Shape,
        /// Shape found in the table section
        actual: Shape,
    },
    /// A results collection has no entry for the requested card count
    #[error("No data found for {cards} cards.")]
    ResultsMissing {
        /// The requested card count
        cards: usize,
    },
    /// Invalid argument for the probability model
    #[error(transparent)]
    Model(#[from] ModelError),
    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
