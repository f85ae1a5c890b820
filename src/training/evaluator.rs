//! Evaluation over a validation loader
//!
//! Runs on the inner (non-autodiff) backend, so no gradients are tracked
//! and batch normalisation uses its running statistics.

use burn::nn::loss::CrossEntropyLoss;
use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::dataset::BatchLoader;
use crate::model::Classifier;
use crate::utils::error::{Result, TrainError};
use crate::utils::logging::Reporter;
use crate::utils::metrics::ConfusionMatrix;

/// Outcome of one pass over the validation set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    /// Mean per-sample loss
    pub avg_loss: f64,
    pub correct: usize,
    pub total: usize,
    /// Top-1 accuracy in percent
    pub accuracy: f64,
}

impl EvalSummary {
    /// Summary of the samples counted in `confusion`, whose losses add up
    /// to `loss_sum`
    fn from_confusion(loss_sum: f64, confusion: &ConfusionMatrix) -> Self {
        let total = confusion.total();
        let avg_loss = if total > 0 {
            loss_sum / total as f64
        } else {
            0.0
        };

        Self {
            avg_loss,
            correct: confusion.correct(),
            total,
            accuracy: confusion.accuracy_percent(),
        }
    }
}

/// Summary plus the confusion matrix it was derived from
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub summary: EvalSummary,
    pub confusion: ConfusionMatrix,
}

/// Evaluate `model` on every batch of `loader`.
///
/// `model` is expected in inference mode (see `AutodiffModule::valid`);
/// it is only borrowed, so its parameters cannot change.
pub fn evaluate<B, M>(
    model: &M,
    loader: &mut BatchLoader,
    loss_fn: &CrossEntropyLoss<B>,
    device: &B::Device,
    reporter: &dyn Reporter,
) -> Result<Evaluation>
where
    B: Backend,
    M: Classifier<B>,
{
    let mut loss_sum = 0.0;
    let mut predicted = Vec::new();
    let mut actual = Vec::new();

    for batch in loader.epoch::<B>(device) {
        let batch = batch?;
        let batch_len = batch.len();

        let logits = model.predict(batch.images);
        let loss = loss_fn.forward(logits.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        loss_sum += loss_value * batch_len as f64;

        predicted.extend(int_values(top1(logits))?);
        actual.extend(int_values(batch.targets)?);
    }

    let confusion = ConfusionMatrix::from_predictions(&predicted, &actual, model.num_classes());
    let summary = EvalSummary::from_confusion(loss_sum, &confusion);

    reporter.info(&format!(
        "Test set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)",
        summary.avg_loss, summary.correct, summary.total, summary.accuracy
    ));

    Ok(Evaluation { summary, confusion })
}

/// Index of the highest score per row
pub fn top1<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    let [batch_size, _] = logits.dims();
    logits.argmax(1).reshape([batch_size])
}

fn int_values<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values: Vec<i64> = tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| TrainError::Model(format!("Failed to read labels: {:?}", e)))?;
    Ok(values.into_iter().map(|v| v as usize).collect())
}
