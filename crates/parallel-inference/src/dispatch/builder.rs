use std::marker::PhantomData;
use std::time::Duration;
use crate::backend::Backend;
use crate::engine::ComputeEngine;
use crate::error::DispatchError;
use super::config::{DispatcherConfig, InferenceMode};
use super::dispatcher::Dispatcher;

/// Fluent construction of a [`Dispatcher`] around a prototype model.
///
/// ```ignore
/// let dispatcher = Dispatcher::builder(model)
///     .mode(InferenceMode::Batched)
///     .workers(4)
///     .batch_limit(16)
///     .build()?;
/// ```
pub struct DispatcherBuilder<T, E> {
    model: E,
    config: DispatcherConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E> DispatcherBuilder<T, E>
where T: Backend, E: ComputeEngine<T>
{
    pub fn new(model: E) -> Self {
        Self {
            model,
            config: DispatcherConfig::default(),
            _marker: PhantomData,
        }
    }

    pub fn mode(mut self, mode: InferenceMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = Some(workers);
        self
    }

    pub fn batch_limit(mut self, batch_limit: usize) -> Self {
        self.config.batch_limit = batch_limit;
        self
    }

    pub fn queue_limit(mut self, queue_limit: usize) -> Self {
        self.config.queue_limit = queue_limit;
        self
    }

    pub fn batch_wait(mut self, batch_wait: Duration) -> Self {
        self.config.batch_wait = batch_wait;
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.config.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Validates the configuration, then starts the worker pool.
    ///
    /// Returns once every worker holds a replica of the model.
    pub fn build(self) -> Result<Dispatcher<T, E>, DispatchError> {
        Dispatcher::with_config(self.model, self.config)
    }
}
