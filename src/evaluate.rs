use crate::{
    data::{DigitBatcher, DigitDataset, DigitItem},
    model::DigitClassifier,
    Error,
};
use burn::{
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    prelude::*,
    tensor::{activation::softmax, ElementConversion},
};
use std::fmt;

/// Loss and accuracy of a model over a held-out split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Mean cross-entropy per sample.
    pub loss: f64,
    /// Fraction of correctly classified samples, in `[0, 1]`.
    pub accuracy: f64,
    pub num_samples: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss {:.4}, accuracy {:.2}% over {} samples",
            self.loss,
            self.accuracy * 100.0,
            self.num_samples
        )
    }
}

/// Computes the mean loss and the accuracy of `model` on `dataset`.
pub fn evaluate<B: Backend, M: DigitClassifier<B>>(
    model: &M,
    dataset: DigitDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation, Error> {
    let dataloader = DataLoaderBuilder::new(DigitBatcher::<B>::new(device.clone()))
        .batch_size(batch_size)
        .build(dataset);

    let mut total_loss = 0.0;
    let mut correct = 0;
    let mut num_samples = 0;

    for batch in dataloader.iter() {
        let batch_len = batch.targets.dims()[0];
        let item = model.forward_classification(batch);

        let predictions = item.output.argmax(1).squeeze::<1>(1);
        let batch_correct = predictions
            .equal(item.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        total_loss += item.loss.into_scalar().elem::<f64>() * batch_len as f64;
        correct += batch_correct as usize;
        num_samples += batch_len;
    }

    if num_samples == 0 {
        return Err(Error::EmptyDataset);
    }

    Ok(Evaluation {
        loss: total_loss / num_samples as f64,
        accuracy: correct as f64 / num_samples as f64,
        num_samples,
    })
}

/// Predicted digit and the probability the model assigns to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub label: u8,
    pub confidence: f32,
}

/// Classifies `items` in a single batch.
pub fn predict<B: Backend, M: DigitClassifier<B>>(
    model: &M,
    items: &[DigitItem],
    device: &B::Device,
) -> Vec<Prediction> {
    if items.is_empty() {
        return Vec::new();
    }

    let batch = DigitBatcher::<B>::new(device.clone()).batch(items.to_vec());
    let probabilities = softmax(model.forward(batch.images), 1);

    let labels = probabilities.clone().argmax(1).into_data();
    let confidences = probabilities.max_dim(1).into_data();

    labels
        .iter::<i64>()
        .zip(confidences.iter::<f32>())
        .map(|(label, confidence)| Prediction {
            label: label as u8,
            confidence,
        })
        .collect()
}
