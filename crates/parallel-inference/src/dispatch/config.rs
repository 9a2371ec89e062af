use std::time::Duration;
use crate::error::ConfigError;

/// How submissions reach the dispatch queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InferenceMode {
    /// Every submission is its own request and its own forward pass.
    #[default]
    Sequential,

    /// Concurrent submissions are merged along the batch dimension, up to
    /// [`DispatcherConfig::batch_limit`] callers per forward pass.
    Batched,
}

/// Construction parameters of a [`Dispatcher`](super::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub mode: InferenceMode,

    /// Number of worker threads, each holding one model replica.
    ///
    /// `None` means one worker per device reported by the engine.
    pub workers: Option<usize>,

    /// Maximum number of callers merged into one batch. Ignored in
    /// [`InferenceMode::Sequential`].
    pub batch_limit: usize,

    /// Capacity of the dispatch queue. Submitters wait while it is full.
    pub queue_limit: usize,

    /// How long a worker holding an unfilled batch waits for more callers
    /// before running it. Zero runs every batch as soon as a worker takes it.
    pub batch_wait: Duration,

    /// Classification labels, carried for the caller and never interpreted.
    pub labels: Option<Vec<String>>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            mode: InferenceMode::Sequential,
            workers: None,
            batch_limit: 32,
            queue_limit: 64,
            batch_wait: Duration::ZERO,
            labels: None,
        }
    }
}

impl DispatcherConfig {
    /// Rejects non-positive sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(0) = self.workers {
            return Err(ConfigError::Workers(0));
        }
        if self.batch_limit == 0 {
            return Err(ConfigError::BatchLimit(0));
        }
        if self.queue_limit == 0 {
            return Err(ConfigError::QueueLimit(0));
        }
        Ok(())
    }
}
