//! Supervised training loop
//!
//! One SGD step per batch at a fixed learning rate, a progress line every
//! `LOG_INTERVAL` batches, and an evaluation pass after every epoch.

use burn::{
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, Sgd, SgdConfig},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};

use super::evaluator::{evaluate, EvalSummary, Evaluation};
use crate::backend::RunContext;
use crate::dataset::BatchLoader;
use crate::model::Classifier;
use crate::utils::error::Result;
use crate::utils::logging::Reporter;
use crate::utils::metrics::RunningAverage;

/// Batches between two progress lines
pub const LOG_INTERVAL: usize = 20;

/// Loop state; `epoch` counts completed epochs
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    pub epoch: usize,
    /// Batch losses of the current epoch
    pub epoch_loss: RunningAverage,
}

/// Record of one finished epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    /// Mean of the batch losses
    pub train_loss: f64,
    pub batches: usize,
    pub validation: EvalSummary,
}

/// Per-epoch records of a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn final_train_loss(&self) -> Option<f64> {
        self.epochs.last().map(|record| record.train_loss)
    }

    pub fn final_validation(&self) -> Option<&EvalSummary> {
        self.epochs.last().map(|record| &record.validation)
    }

    /// Epoch with the highest validation accuracy
    pub fn best_epoch(&self) -> Option<&EpochRecord> {
        self.epochs
            .iter()
            .max_by(|a, b| a.validation.accuracy.total_cmp(&b.validation.accuracy))
    }
}

/// Trains a classifier with SGD and cross-entropy loss
pub struct Trainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
{
    model: M,
    optimizer: OptimizerAdaptor<Sgd<B::InnerBackend>, M, B>,
    loss_fn: CrossEntropyLoss<B>,
    eval_loss_fn: CrossEntropyLoss<B::InnerBackend>,
    learning_rate: f64,
    context: RunContext<B>,
    state: TrainingState,
    last_evaluation: Option<Evaluation>,
}

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
{
    pub fn new(model: M, learning_rate: f64, context: RunContext<B>) -> Self {
        let loss_fn = CrossEntropyLossConfig::new().init(&context.device);
        let eval_loss_fn = CrossEntropyLossConfig::new().init(&context.device);

        Self {
            model,
            optimizer: SgdConfig::new().init(),
            loss_fn,
            eval_loss_fn,
            learning_rate,
            context,
            state: TrainingState::default(),
            last_evaluation: None,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Confusion matrix and summary of the most recent evaluation
    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_evaluation.as_ref()
    }

    /// Hand back the trained model
    pub fn into_model(self) -> M {
        self.model
    }

    /// Run `epochs` epochs, evaluating on `valid` after each one
    pub fn fit(
        &mut self,
        train: &mut BatchLoader,
        valid: &mut BatchLoader,
        epochs: usize,
        reporter: &dyn Reporter,
    ) -> Result<TrainingHistory> {
        let mut history = TrainingHistory::default();

        for _ in 0..epochs {
            let (train_loss, batches) = self.train_epoch(train, reporter)?;
            let validation = self.evaluate(valid, reporter)?;

            self.state.epoch += 1;
            reporter.debug(&format!(
                "Epoch {} done: train_loss={:.4}, val_loss={:.4}, val_acc={:.2}%",
                self.state.epoch, train_loss, validation.avg_loss, validation.accuracy
            ));

            history.epochs.push(EpochRecord {
                epoch: self.state.epoch,
                train_loss,
                batches,
                validation,
            });
        }

        Ok(history)
    }

    /// One pass over `train`; returns (mean batch loss, batch count)
    pub fn train_epoch(
        &mut self,
        train: &mut BatchLoader,
        reporter: &dyn Reporter,
    ) -> Result<(f64, usize)> {
        let epoch = self.state.epoch + 1;
        let num_batches = train.num_batches();
        let num_samples = train.len();
        self.state.epoch_loss.reset();

        for (batch_idx, batch) in train.epoch::<B>(&self.context.device).enumerate() {
            let batch = batch?;
            let batch_len = batch.len();

            // Gradients are produced fresh by each backward pass
            let logits = self.model.predict(batch.images);
            let loss = self.loss_fn.forward(logits, batch.targets);
            let loss_value: f64 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.learning_rate, self.model.clone(), grads);

            self.state.epoch_loss.add(loss_value);

            if batch_idx % LOG_INTERVAL == 0 {
                reporter.info(&format!(
                    "Train Epoch: {} [{}/{} ({:.0}%)] Loss: {:.6}",
                    epoch,
                    batch_idx * batch_len,
                    num_samples,
                    100.0 * batch_idx as f64 / num_batches as f64,
                    loss_value
                ));
            }
        }

        let epoch_loss = &self.state.epoch_loss;
        Ok((epoch_loss.average(), epoch_loss.count()))
    }

    /// Evaluate the current parameters in inference mode
    pub fn evaluate(
        &mut self,
        valid: &mut BatchLoader,
        reporter: &dyn Reporter,
    ) -> Result<EvalSummary> {
        let model = self.model.valid();
        let evaluation = evaluate(
            &model,
            valid,
            &self.eval_loss_fn,
            &self.context.device,
            reporter,
        )?;
        let summary = evaluation.summary;
        self.last_evaluation = Some(evaluation);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, accuracy: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0 / epoch as f64,
            batches: 3,
            validation: EvalSummary {
                avg_loss: 0.5,
                correct: 0,
                total: 10,
                accuracy,
            },
        }
    }

    #[test]
    fn test_training_state_default() {
        let state = TrainingState::default();
        assert_eq!(state.epoch, 0);
        assert_eq!(state.epoch_loss.count(), 0);
    }

    #[test]
    fn test_history_accessors() {
        let history = TrainingHistory {
            epochs: vec![record(1, 40.0), record(2, 70.0), record(3, 60.0)],
        };

        assert_eq!(history.final_train_loss(), Some(1.0 / 3.0));
        assert_eq!(history.final_validation().map(|v| v.accuracy), Some(60.0));
        assert_eq!(history.best_epoch().map(|r| r.epoch), Some(2));
    }

    #[test]
    fn test_empty_history() {
        let history = TrainingHistory::default();
        assert!(history.final_train_loss().is_none());
        assert!(history.best_epoch().is_none());
    }
}
