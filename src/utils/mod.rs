//! Utilities module for logging, metrics, and error types
//!
//! - Structured logging with tracing and the injected `Reporter`
//! - Confusion matrix and running averages
//! - Error handling types

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, TrainError};
pub use logging::{init_logging, LogConfig, LogLevel, MemoryReporter, Reporter, TracingReporter};
pub use metrics::{ConfusionMatrix, RunningAverage};

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}
