//! Analysis toolkit for the card game SET.
//!
//! The crate drives an external table generator, parses its text reports,
//! compares the observed statistics against an analytic probability model
//! and prepares labeled datasets for learning.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod augment;
pub mod error;
pub mod generator;
pub mod probability;
pub mod report;
pub mod results;
pub mod rule;
pub mod statistics;
pub mod sweep;
pub mod tables;

pub use error::Error;
pub use report::{ReportParameters, SimulationReport};
pub use results::ResultsCollection;
pub use tables::{LabeledTables, Shape, Table};
