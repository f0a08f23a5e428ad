//! Conversion of labeled tables into tensors.

use candle_core::{Device, Tensor};
use setlab::LabeledTables;

use crate::error::Error;

/// What a model is asked to predict for a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelKind {
    /// Number of SETs on the table
    Count,
    /// 1 if the table contains at least one SET, 0 otherwise
    #[default]
    Presence,
}

impl LabelKind {
    fn label(self, set_count: u32) -> f32 {
        match self {
            LabelKind::Count => set_count as f32,
            LabelKind::Presence => {
                if set_count > 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Tables flattened into rows of `num_cards * num_attributes` card values.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    num_cards: usize,
    num_attributes: usize,
    features: Vec<f32>,
    labels: Vec<f32>,
}

impl Dataset {
    /// Build a dataset from parsed tables.
    pub fn from_tables(tables: &LabeledTables, kind: LabelKind) -> Result<Self, Error> {
        if tables.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut features =
            Vec::with_capacity(tables.len() * tables.num_cards * tables.num_attributes);
        let mut labels = Vec::with_capacity(tables.len());
        for (table, count) in tables.iter() {
            features.extend(table.values().map(|value| value as f32));
            labels.push(kind.label(count));
        }

        Ok(Self {
            num_cards: tables.num_cards,
            num_attributes: tables.num_attributes,
            features,
            labels,
        })
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no examples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Cards per table.
    pub fn num_cards(&self) -> usize {
        self.num_cards
    }

    /// Attributes per card.
    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    /// Target values in example order.
    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    fn width(&self) -> usize {
        self.num_cards * self.num_attributes
    }

    /// Examples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        let width = self.width();
        let mut features = Vec::with_capacity(indices.len() * width);
        let mut labels = Vec::with_capacity(indices.len());
        for &index in indices {
            features.extend_from_slice(&self.features[index * width..(index + 1) * width]);
            labels.push(self.labels[index]);
        }

        Self {
            num_cards: self.num_cards,
            num_attributes: self.num_attributes,
            features,
            labels,
        }
    }

    /// Split off the last `fraction` of the examples for validation.
    ///
    /// The split happens before any shuffling, so the validation examples are
    /// always the tail of the dataset.
    pub fn split(&self, fraction: f64) -> (Self, Self) {
        let fraction = fraction.clamp(0.0, 1.0);
        let boundary = (self.len() as f64 * (1.0 - fraction)).floor() as usize;
        let indices: Vec<usize> = (0..self.len()).collect();

        (
            self.subset(&indices[..boundary]),
            self.subset(&indices[boundary..]),
        )
    }

    /// Inputs of shape `(n, 1, cards, attributes)` and targets of shape `(n, 1)`
    /// for the examples at `indices`.
    pub fn tensors(&self, indices: &[usize], device: &Device) -> Result<(Tensor, Tensor), Error> {
        let batch = self.subset(indices);
        let inputs = Tensor::from_vec(
            batch.features,
            (indices.len(), 1, self.num_cards, self.num_attributes),
            device,
        )?;
        let targets = Tensor::from_vec(batch.labels, (indices.len(), 1), device)?;

        Ok((inputs, targets))
    }
}

#[cfg(test)]
mod test {
    use setlab::Table;
    use test_log::test;

    use super::*;

    fn tables() -> LabeledTables {
        LabeledTables {
            num_cards: 2,
            num_attributes: 2,
            tables: vec![
                Table::new(vec![vec![0, 1], vec![1, 0]]),
                Table::new(vec![vec![1, 1], vec![0, 0]]),
                Table::new(vec![vec![-1, 0], vec![0, -1]]),
                Table::new(vec![vec![1, -1], vec![-1, 1]]),
                Table::new(vec![vec![0, 0], vec![0, 0]]),
            ],
            set_counts: vec![0, 1, 3, 0, 2],
        }
    }

    #[test]
    fn labels() {
        let presence = Dataset::from_tables(&tables(), LabelKind::Presence).unwrap();
        assert_eq!(presence.labels(), &[0.0, 1.0, 1.0, 0.0, 1.0]);

        let count = Dataset::from_tables(&tables(), LabelKind::Count).unwrap();
        assert_eq!(count.labels(), &[0.0, 1.0, 3.0, 0.0, 2.0]);
    }

    #[test]
    fn empty() {
        assert!(matches!(
            Dataset::from_tables(&LabeledTables::default(), LabelKind::Count),
            Err(Error::EmptyDataset)
        ));
    }

    #[test]
    fn validation_is_the_tail() {
        let dataset = Dataset::from_tables(&tables(), LabelKind::Count).unwrap();
        let (train, validation) = dataset.split(0.2);

        assert_eq!(train.labels(), &[0.0, 1.0, 3.0, 0.0]);
        assert_eq!(validation.labels(), &[2.0]);

        let (train, validation) = dataset.split(0.0);
        assert_eq!(train.len(), 5);
        assert!(validation.is_empty());
    }

    #[test]
    fn tensor_layout() {
        let dataset = Dataset::from_tables(&tables(), LabelKind::Count).unwrap();
        let (inputs, targets) = dataset.tensors(&[2, 0], &Device::Cpu).unwrap();

        assert_eq!(inputs.dims(), &[2, 1, 2, 2]);
        assert_eq!(targets.dims(), &[2, 1]);
        assert_eq!(
            inputs.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![-1.0, 0.0, 0.0, -1.0, 0.0, 1.0, 1.0, 0.0]
        );
        assert_eq!(
            targets.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![3.0, 0.0]
        );
    }
}
