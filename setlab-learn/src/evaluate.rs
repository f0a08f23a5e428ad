//! Evaluation of a trained network on a sample of tables.

use std::time::{Duration, Instant};

use rand::{rngs::StdRng, SeedableRng};

use crate::{data::Dataset, error::Error, model::Network};

/// Predictions further than this from the label are counted as wrong.
pub const MISMATCH_THRESHOLD: f64 = 0.5;
const PREDICTION_BATCH: usize = 512;

/// Which examples are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Every example
    All,
    /// The first `n` examples
    Prefix(usize),
    /// `size` distinct examples drawn with a seeded generator
    Random {
        /// Number of examples
        size: usize,
        /// Seed of the generator
        seed: u64,
    },
}

impl Sampling {
    fn indices(self, available: usize) -> Result<Vec<usize>, Error> {
        let requested = match self {
            Sampling::All => available,
            Sampling::Prefix(size) | Sampling::Random { size, .. } => size,
        };
        if requested > available {
            return Err(Error::SampleTooLarge {
                requested,
                available,
            });
        }

        Ok(match self {
            Sampling::All | Sampling::Prefix(_) => (0..requested).collect(),
            Sampling::Random { seed, .. } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut indices =
                    rand::seq::index::sample(&mut rng, available, requested).into_vec();
                indices.sort_unstable();
                indices
            }
        })
    }
}

/// Result of an evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Number of evaluated examples
    pub evaluated: usize,
    /// Dataset indices of the wrongly predicted examples
    pub mismatches: Vec<usize>,
    /// Wall-clock time spent predicting
    pub elapsed: Duration,
}

impl EvaluationReport {
    /// Share of correctly predicted examples.
    pub fn accuracy(&self) -> f64 {
        if self.evaluated == 0 {
            return 0.0;
        }
        1.0 - self.mismatches.len() as f64 / self.evaluated as f64
    }
}

/// Positions where `predicted` is further than [MISMATCH_THRESHOLD] from `truth`.
pub fn mismatches(truth: &[f32], predicted: &[f32]) -> Vec<usize> {
    truth
        .iter()
        .zip(predicted)
        .enumerate()
        .filter(|&(_, (&t, &p))| f64::from((t - p).abs()) > MISMATCH_THRESHOLD)
        .map(|(index, _)| index)
        .collect()
}

/// Predict the sampled examples of `dataset` and compare with their labels.
pub fn evaluate(
    network: &Network,
    dataset: &Dataset,
    sampling: Sampling,
) -> Result<EvaluationReport, Error> {
    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }
    let indices = sampling.indices(dataset.len())?;

    let start = Instant::now();
    let mut predicted = Vec::with_capacity(indices.len());
    for batch in indices.chunks(PREDICTION_BATCH) {
        let (inputs, _) = dataset.tensors(batch, network.device())?;
        predicted.extend(network.predict(&inputs)?);
    }
    let elapsed = start.elapsed();

    let truth: Vec<f32> = indices.iter().map(|&i| dataset.labels()[i]).collect();
    let report = EvaluationReport {
        evaluated: indices.len(),
        mismatches: mismatches(&truth, &predicted)
            .into_iter()
            .map(|position| indices[position])
            .collect(),
        elapsed,
    };

    log::info!(
        "{} of {} tables predicted wrongly in {:?}",
        report.mismatches.len(),
        report.evaluated,
        report.elapsed
    );
    Ok(report)
}
