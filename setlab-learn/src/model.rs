//! Network topologies and loss functions.

use std::{fmt, path::Path};

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{
    init::DEFAULT_KAIMING_NORMAL, linear, Conv2d, Conv2dConfig, Dropout, Init, Linear,
    VarBuilder, VarMap,
};

use crate::error::Error;

const DROPOUT_RATE: f32 = 0.3;
const HUBER_DELTA: f64 = 1.0;
const CONV_CHANNELS: [usize; 3] = [32, 64, 128];

/// Shape of the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Architecture {
    /// Fully connected layers on the flattened table
    #[default]
    Dense,
    /// Convolutions along each card's attributes followed by fully connected layers
    Conv,
}

impl Architecture {
    /// Width of each hidden layer and whether dropout follows it.
    fn hidden_layers(self) -> &'static [(usize, bool)] {
        match self {
            Architecture::Dense => &[(256, true), (128, true), (128, false), (64, false)],
            Architecture::Conv => &[(256, true), (128, true), (64, false)],
        }
    }
}

/// Training objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Loss {
    /// Mean squared error on the raw output
    MeanSquaredError,
    /// Binary cross entropy; the output is read through a sigmoid
    #[default]
    BinaryCrossEntropy,
    /// Huber loss with threshold 1 on the raw output
    Huber,
}

impl Loss {
    /// Mean loss of raw network outputs against targets.
    pub fn compute(self, outputs: &Tensor, targets: &Tensor) -> Result<Tensor, Error> {
        let loss = match self {
            Loss::MeanSquaredError => candle_nn::loss::mse(outputs, targets)?,
            Loss::BinaryCrossEntropy => {
                candle_nn::loss::binary_cross_entropy_with_logit(outputs, targets)?
            }
            Loss::Huber => {
                let error = (outputs - targets)?.abs()?;
                let quadratic = error.clamp(0.0, HUBER_DELTA)?;
                let linear = (&error - &quadratic)?;
                ((quadratic.sqr()? * 0.5)? + (linear * HUBER_DELTA)?)?.mean_all()?
            }
        };
        Ok(loss)
    }

    /// Turn raw outputs into predictions.
    fn activate(self, outputs: Tensor) -> Result<Tensor, Error> {
        Ok(match self {
            Loss::BinaryCrossEntropy => candle_nn::ops::sigmoid(&outputs)?,
            Loss::MeanSquaredError | Loss::Huber => outputs,
        })
    }
}

#[derive(Debug)]
struct Hidden {
    layer: Linear,
    dropout: bool,
}

/// Convolution with a `(1, 2)` kernel, i.e. over pairs of neighbouring attributes.
fn attribute_conv(
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
) -> Result<Conv2d, Error> {
    let weight = vb.get_with_hints(
        (out_channels, in_channels, 1, 2),
        "weight",
        DEFAULT_KAIMING_NORMAL,
    )?;
    let bound = 1.0 / ((in_channels * 2) as f64).sqrt();
    let bias = vb.get_with_hints(
        out_channels,
        "bias",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;

    Ok(Conv2d::new(weight, Some(bias), Conv2dConfig::default()))
}

/// Feed-forward network mapping a table to a single value.
pub struct Network {
    architecture: Architecture,
    loss: Loss,
    num_cards: usize,
    num_attributes: usize,
    convolutions: Vec<Conv2d>,
    hidden: Vec<Hidden>,
    output: Linear,
    dropout: Dropout,
    varmap: VarMap,
    device: Device,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("architecture", &self.architecture)
            .field("loss", &self.loss)
            .field("num_cards", &self.num_cards)
            .field("num_attributes", &self.num_attributes)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Freshly initialized network for tables of the given size.
    pub fn new(
        architecture: Architecture,
        loss: Loss,
        num_cards: usize,
        num_attributes: usize,
        device: &Device,
    ) -> Result<Self, Error> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let mut convolutions = Vec::new();
        let mut features = num_cards * num_attributes;
        if architecture == Architecture::Conv {
            let mut channels = 1;
            for (index, &out_channels) in CONV_CHANNELS.iter().enumerate() {
                convolutions.push(attribute_conv(
                    channels,
                    out_channels,
                    vb.pp(format!("conv{index}")),
                )?);
                channels = out_channels;
            }
            features = channels * num_cards * num_attributes.div_ceil(2);
        }

        let mut hidden = Vec::new();
        for (index, &(width, dropout)) in architecture.hidden_layers().iter().enumerate() {
            hidden.push(Hidden {
                layer: linear(features, width, vb.pp(format!("fc{index}")))?,
                dropout,
            });
            features = width;
        }
        let output = linear(features, 1, vb.pp("output"))?;

        Ok(Self {
            architecture,
            loss,
            num_cards,
            num_attributes,
            convolutions,
            hidden,
            output,
            dropout: Dropout::new(DROPOUT_RATE),
            varmap,
            device: device.clone(),
        })
    }

    /// Topology of the network.
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Objective the network is trained for.
    pub fn loss(&self) -> Loss {
        self.loss
    }

    /// Device holding the parameters.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Table size the network accepts, as `(cards, attributes)`.
    pub fn input_size(&self) -> (usize, usize) {
        (self.num_cards, self.num_attributes)
    }

    pub(crate) fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Raw outputs of shape `(n, 1)` for inputs of shape `(n, 1, cards, attributes)`.
    ///
    /// Dropout is only active if `train` is set.
    pub fn forward_t(&self, inputs: &Tensor, train: bool) -> Result<Tensor, Error> {
        let mut x = inputs.clone();

        if !self.convolutions.is_empty() {
            // "same" padding for a kernel of width 2 adds one column on the right
            for conv in &self.convolutions {
                x = conv.forward(&x.pad_with_zeros(D::Minus1, 0, 1)?)?.relu()?;
            }
            if x.dim(D::Minus1)? % 2 == 1 {
                x = x.pad_with_zeros(D::Minus1, 0, 1)?;
            }
            x = x.max_pool2d_with_stride((1, 2), (1, 2))?;
        }

        x = x.flatten_from(1)?;
        for hidden in &self.hidden {
            x = hidden.layer.forward(&x)?.relu()?;
            if hidden.dropout {
                x = self.dropout.forward(&x, train)?;
            }
        }

        Ok(self.output.forward(&x)?)
    }

    /// Predictions for inputs of shape `(n, 1, cards, attributes)`.
    pub fn predict(&self, inputs: &Tensor) -> Result<Vec<f32>, Error> {
        let outputs = self.loss.activate(self.forward_t(inputs, false)?)?;
        Ok(outputs.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Store the parameters as safetensors.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        self.varmap.save(path.as_ref())?;
        log::info!("Saved weights to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace the parameters by those stored at `path`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        self.varmap.load(path.as_ref())?;
        log::info!("Loaded weights from {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use assert_fs::{prelude::*, TempDir};
    use test_log::test;

    use super::*;

    fn inputs(n: usize, cards: usize, attributes: usize) -> Tensor {
        let values: Vec<f32> = (0..n * cards * attributes)
            .map(|i| (i % 3) as f32 - 1.0)
            .collect();
        Tensor::from_vec(values, (n, 1, cards, attributes), &Device::Cpu).unwrap()
    }

    #[test]
    fn dense_output_shape() {
        let network =
            Network::new(Architecture::Dense, Loss::MeanSquaredError, 4, 3, &Device::Cpu)
                .unwrap();
        let outputs = network.forward_t(&inputs(5, 4, 3), true).unwrap();
        assert_eq!(outputs.dims(), &[5, 1]);
    }

    #[test]
    fn conv_handles_odd_attributes() {
        for attributes in [1, 3, 4] {
            let network = Network::new(
                Architecture::Conv,
                Loss::BinaryCrossEntropy,
                3,
                attributes,
                &Device::Cpu,
            )
            .unwrap();
            let predictions = network.predict(&inputs(2, 3, attributes)).unwrap();
            assert_eq!(predictions.len(), 2);
            assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn inference_is_deterministic() {
        let network =
            Network::new(Architecture::Dense, Loss::Huber, 3, 4, &Device::Cpu).unwrap();
        let batch = inputs(4, 3, 4);
        assert_eq!(
            network.predict(&batch).unwrap(),
            network.predict(&batch).unwrap()
        );
    }

    #[test]
    fn huber_loss() {
        let device = Device::Cpu;
        let outputs = Tensor::new(&[[0.0f32], [3.0]], &device).unwrap();
        let targets = Tensor::new(&[[0.5f32], [0.0]], &device).unwrap();

        let loss = Loss::Huber
            .compute(&outputs, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        // 0.5 * 0.5^2 and 0.5 + (3 - 1)
        assert!((loss - (0.125 + 2.5) / 2.0).abs() < 1e-6);

        let mse = Loss::MeanSquaredError
            .compute(&outputs, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((mse - (0.25 + 9.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn weights_survive_save_and_load() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("weights.safetensors");
        let batch = inputs(3, 3, 2);

        let trained =
            Network::new(Architecture::Conv, Loss::MeanSquaredError, 3, 2, &Device::Cpu)
                .unwrap();
        trained.save(file.path()).unwrap();

        let mut restored =
            Network::new(Architecture::Conv, Loss::MeanSquaredError, 3, 2, &Device::Cpu)
                .unwrap();
        restored.load(file.path()).unwrap();

        assert_eq!(
            trained.predict(&batch).unwrap(),
            restored.predict(&batch).unwrap()
        );
    }
}
