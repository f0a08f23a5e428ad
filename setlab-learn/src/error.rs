//! Error-handling module for training and evaluation.

use thiserror::Error;

/// Error-collection for everything that can go wrong while learning
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// Failure inside a tensor operation
    #[error("Tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),
    /// No examples to work with
    #[error("The dataset does not contain any example.")]
    EmptyDataset,
    /// Evaluation sample exceeds the dataset
    #[error("Cannot sample {requested} examples from a dataset of {available}.")]
    SampleTooLarge {
        /// Requested sample size
        requested: usize,
        /// Number of examples available
        available: usize,
    },
    /// Failure while reading or preparing the data
    #[error(transparent)]
    Setlab(#[from] setlab::Error),
}
