//! Neural networks that predict the SET content of a table.
//!
//! Tables parsed by [setlab] are turned into a [data::Dataset], fitted with
//! [train::train] and scored with [evaluate::evaluate].

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

pub mod data;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod train;

pub use data::{Dataset, LabelKind};
pub use error::Error;
pub use evaluate::{evaluate, EvaluationReport, Sampling};
pub use model::{Architecture, Loss, Network};
pub use train::{train, TrainConfig, TrainingHistory};
