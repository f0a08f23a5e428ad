//! Mini-batch training with learning-rate reduction and early stopping.

use std::collections::HashMap;

use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{data::Dataset, error::Error, model::Network};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// Initial step size of Adam
    pub learning_rate: f64,
    /// Examples per gradient step
    pub batch_size: usize,
    /// Upper bound on passes over the training data
    pub epochs: usize,
    /// Fraction at the end of the dataset held out for validation
    pub validation_split: f64,
    /// Seed of the per-epoch shuffling
    pub seed: u64,
    /// Factor applied to the learning rate on a plateau
    pub plateau_factor: f64,
    /// Epochs without improvement before the learning rate is reduced
    pub plateau_patience: usize,
    /// Lower bound of the learning rate
    pub min_learning_rate: f64,
    /// Epochs without improvement before training stops
    pub early_stopping_patience: usize,
    /// Whether to return to the best weights when training stops
    pub restore_best_weights: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 512,
            epochs: 150,
            validation_split: 0.2,
            seed: 0,
            plateau_factor: 0.5,
            plateau_patience: 10,
            min_learning_rate: 1e-6,
            early_stopping_patience: 15,
            restore_best_weights: true,
        }
    }
}

/// Per-epoch record of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    /// Mean loss over the training batches
    pub train_loss: Vec<f64>,
    /// Loss on the held-out examples; empty without validation data
    pub validation_loss: Vec<f64>,
    /// Learning rate used in each epoch
    pub learning_rate: Vec<f64>,
    /// Epoch with the lowest monitored loss
    pub best_epoch: Option<usize>,
    /// Whether training ended before the configured number of epochs
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Number of completed epochs.
    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }
}

/// Halves the learning rate (or applies another factor) once the monitored loss
/// stopped improving for a number of epochs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlateauSchedule {
    factor: f64,
    patience: usize,
    min_learning_rate: f64,
    best: f64,
    wait: usize,
}

impl PlateauSchedule {
    /// Minimal decrease counted as an improvement.
    const MIN_DELTA: f64 = 1e-4;

    pub(crate) fn new(config: &TrainConfig) -> Self {
        Self {
            factor: config.plateau_factor,
            patience: config.plateau_patience,
            min_learning_rate: config.min_learning_rate,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// New learning rate after an epoch with the given loss, if it changes.
    pub(crate) fn step(&mut self, loss: f64, learning_rate: f64) -> Option<f64> {
        if loss < self.best - Self::MIN_DELTA {
            self.best = loss;
            self.wait = 0;
            return None;
        }

        self.wait += 1;
        if self.wait < self.patience || learning_rate <= self.min_learning_rate {
            return None;
        }

        self.wait = 0;
        Some((learning_rate * self.factor).max(self.min_learning_rate))
    }
}

/// Outcome of [EarlyStopping::step].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Improved,
    Waiting,
    Exhausted,
}

/// Tracks the best monitored loss and when to give up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EarlyStopping {
    patience: usize,
    best: f64,
    wait: usize,
}

impl EarlyStopping {
    pub(crate) fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    pub(crate) fn step(&mut self, loss: f64) -> Progress {
        if loss < self.best {
            self.best = loss;
            self.wait = 0;
            return Progress::Improved;
        }

        self.wait += 1;
        if self.wait >= self.patience {
            Progress::Exhausted
        } else {
            Progress::Waiting
        }
    }
}

fn snapshot(network: &Network) -> Result<HashMap<String, Tensor>, Error> {
    let data = network
        .varmap()
        .data()
        .lock()
        .map_err(|error| candle_core::Error::Msg(error.to_string()))?;

    let mut weights = HashMap::with_capacity(data.len());
    for (name, var) in data.iter() {
        weights.insert(name.clone(), var.as_tensor().copy()?);
    }
    Ok(weights)
}

fn restore(network: &Network, weights: &HashMap<String, Tensor>) -> Result<(), Error> {
    let data = network
        .varmap()
        .data()
        .lock()
        .map_err(|error| candle_core::Error::Msg(error.to_string()))?;

    for (name, var) in data.iter() {
        if let Some(tensor) = weights.get(name) {
            var.set(tensor)?;
        }
    }
    Ok(())
}

/// Mean loss of `network` over `dataset` without dropout.
pub fn dataset_loss(
    network: &Network,
    dataset: &Dataset,
    batch_size: usize,
) -> Result<f64, Error> {
    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let indices: Vec<usize> = (0..dataset.len()).collect();
    let mut total = 0.0;
    for batch in indices.chunks(batch_size.max(1)) {
        let (inputs, targets) = dataset.tensors(batch, network.device())?;
        let outputs = network.forward_t(&inputs, false)?;
        let loss = network.loss().compute(&outputs, &targets)?;
        total += f64::from(loss.to_scalar::<f32>()?) * batch.len() as f64;
    }

    Ok(total / dataset.len() as f64)
}

/// Fit `network` to `dataset`.
///
/// The last `validation_split` of the examples is held out and its loss drives
/// both the learning-rate schedule and early stopping. Without validation
/// examples the training loss is monitored instead.
pub fn train(
    network: &Network,
    dataset: &Dataset,
    config: &TrainConfig,
) -> Result<TrainingHistory, Error> {
    let (training, validation) = dataset.split(config.validation_split);
    if training.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if validation.is_empty() {
        log::warn!("No validation examples, monitoring the training loss");
    }
    log::info!(
        "Training on {} examples, validating on {}",
        training.len(),
        validation.len()
    );

    let mut optimizer = AdamW::new(
        network.varmap().all_vars(),
        ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        },
    )?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut plateau = PlateauSchedule::new(config);
    let mut stopping = EarlyStopping::new(config.early_stopping_patience);
    let mut best_weights = None;
    let mut history = TrainingHistory::default();
    let mut order: Vec<usize> = (0..training.len()).collect();

    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);

        let mut total = 0.0;
        for batch in order.chunks(config.batch_size.max(1)) {
            let (inputs, targets) = training.tensors(batch, network.device())?;
            let outputs = network.forward_t(&inputs, true)?;
            let loss = network.loss().compute(&outputs, &targets)?;
            optimizer.backward_step(&loss)?;
            total += f64::from(loss.to_scalar::<f32>()?) * batch.len() as f64;
        }
        let train_loss = total / training.len() as f64;

        let monitored = if validation.is_empty() {
            train_loss
        } else {
            let loss = dataset_loss(network, &validation, config.batch_size)?;
            history.validation_loss.push(loss);
            loss
        };
        history.train_loss.push(train_loss);
        history.learning_rate.push(optimizer.learning_rate());

        log::info!(
            "Epoch {}/{}: loss {train_loss:.4}, monitored loss {monitored:.4}",
            epoch + 1,
            config.epochs
        );

        if let Some(learning_rate) = plateau.step(monitored, optimizer.learning_rate()) {
            log::info!("Reducing learning rate to {learning_rate:e}");
            optimizer.set_learning_rate(learning_rate);
        }

        match stopping.step(monitored) {
            Progress::Improved => {
                history.best_epoch = Some(epoch);
                if config.restore_best_weights {
                    best_weights = Some(snapshot(network)?);
                }
            }
            Progress::Waiting => {}
            Progress::Exhausted => {
                log::info!("Stopping after epoch {}", epoch + 1);
                history.stopped_early = true;
                break;
            }
        }
    }

    if let Some(weights) = best_weights {
        log::debug!("Restoring weights of epoch {:?}", history.best_epoch);
        restore(network, &weights)?;
    }

    Ok(history)
}
