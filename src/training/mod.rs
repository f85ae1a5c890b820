//! Training module
//!
//! - `trainer`: the SGD epoch loop
//! - `evaluator`: inference-mode validation pass
//! - `pipeline`: a complete run from directories to saved artifacts

pub mod evaluator;
pub mod pipeline;
pub mod trainer;

pub use evaluator::{evaluate, top1, EvalSummary, Evaluation};
pub use pipeline::{run_training, RunOutcome, RunSummary, CONFUSION_FILE, SUMMARY_FILE};
pub use trainer::{EpochRecord, Trainer, TrainingHistory, TrainingState, LOG_INTERVAL};
