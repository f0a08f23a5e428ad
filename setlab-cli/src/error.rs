//! This module defines all the errors that can occur while executing setlab-cli.

use std::path::PathBuf;

use thiserror::Error;

/// Error that occur during execution of the CLI app
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// A plot could not be drawn
    #[error("Failed to render \"{filename}\": {message}")]
    Plotting {
        /// Image that was being written
        filename: PathBuf,
        /// Description from the drawing backend
        message: String,
    },
    /// Recounting disagrees with the report
    #[error("{count} tables have a reported SET count that differs from the recount")]
    CountsDiffer {
        /// Number of disagreeing tables
        count: usize,
    },
    /// Error resulting from io operations
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Error originating from the analysis library
    #[error(transparent)]
    SetlabError(#[from] setlab::Error),
    /// Error originating from training or evaluation
    #[error(transparent)]
    LearnError(#[from] setlab_learn::Error),
}
