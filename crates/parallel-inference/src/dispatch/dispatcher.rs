use std::sync::Arc;
use tracing::info;
use crate::backend::Backend;
use crate::communication::{channel, Contribution, Notification, ObservableRequest, Outcome};
use crate::core::WorkerState;
use crate::core::assembler::BatchAssembler;
use crate::core::pool::WorkerPool;
use crate::core::queue::DispatchQueue;
use crate::engine::ComputeEngine;
use crate::error::{ConfigError, DispatchError};
use crate::tensor::operations::batch_rows;
use super::builder::DispatcherBuilder;
use super::config::{DispatcherConfig, InferenceMode};

/// # Dispatcher
///
/// The entry point for inference callers.
///
/// A dispatcher owns a pool of worker threads, each running its own replica
/// of the prototype model, and a bounded queue feeding them. Submissions are
/// accepted from any thread or task:
///
/// * In [`InferenceMode::Sequential`] every submission becomes one request
///   and one forward pass, and the caller receives the model output as is.
/// * In [`InferenceMode::Batched`] concurrent submissions are concatenated
///   along the batch dimension into one forward pass; each caller receives
///   the rows of every output that correspond to its own inputs.
///
/// A full queue makes submitters wait; this is the only admission control.
///
/// ## Failure behavior
///
/// * A forward pass returning an error fails the callers of that request
///   with [`DispatchError::Computation`]; the worker keeps serving.
/// * A forward pass that panics kills its worker. Its callers receive
///   [`DispatchError::Abandoned`], and once no worker is left every queued
///   and future caller receives [`DispatchError::NoWorkers`].
///
/// Dropping the dispatcher shuts it down.
pub struct Dispatcher<T, E> {
    config: DispatcherConfig,
    model: Arc<E>,
    queue: DispatchQueue<T>,
    assembler: Option<BatchAssembler<T>>,
    pool: WorkerPool<T>,
}

impl<T, E> Dispatcher<T, E>
where T: Backend, E: ComputeEngine<T>
{
    pub fn builder(model: E) -> DispatcherBuilder<T, E> {
        DispatcherBuilder::new(model)
    }

    /// Starts a dispatcher around `model`.
    ///
    /// Blocks until every worker has replicated the model.
    ///
    /// # Returns
    ///
    /// [`DispatchError::Config`] for invalid parameters, or the first
    /// replication failure of any worker
    pub fn with_config(model: E, mut config: DispatcherConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let workers = config.workers.unwrap_or_else(|| model.device_count());
        if workers == 0 {
            return Err(ConfigError::Workers(workers).into());
        }
        config.workers = Some(workers);

        let model = Arc::new(model);
        let queue = DispatchQueue::bounded(config.queue_limit);
        let pool = WorkerPool::start(model.clone(), workers, queue.clone(), config.batch_wait)?;
        let assembler = match config.mode {
            InferenceMode::Sequential => None,
            InferenceMode::Batched => Some(BatchAssembler::new(config.batch_limit, queue.clone())),
        };

        info!(
            mode = ?config.mode,
            workers,
            batch_limit = config.batch_limit,
            queue_limit = config.queue_limit,
            "dispatcher started"
        );
        Ok(Self { config, model, queue, assembler, pool })
    }

    /// Runs the model on `inputs` and returns this caller's outputs.
    ///
    /// In batched mode every input must have a batch dimension of the same
    /// size, and the returned outputs carry exactly that many rows.
    pub async fn submit(&self, inputs: Vec<T>) -> Result<Vec<T>, DispatchError> {
        self.dispatch(inputs).await?.await
    }

    /// Runs the model on a single input and returns its first output.
    pub async fn submit_one(&self, input: T) -> Result<T, DispatchError> {
        first_output(self.submit(vec![input]).await)
    }

    /// Blocking counterpart of [`submit`](Dispatcher::submit) for plain threads.
    ///
    /// Must not be called from within an async runtime worker thread.
    pub fn submit_blocking(&self, inputs: Vec<T>) -> Result<Vec<T>, DispatchError> {
        futures::executor::block_on(self.dispatch(inputs))?.wait()
    }

    /// Blocking counterpart of [`submit_one`](Dispatcher::submit_one).
    pub fn submit_one_blocking(&self, input: T) -> Result<T, DispatchError> {
        first_output(self.submit_blocking(vec![input]))
    }

    /// Stops every worker and waits for them to exit.
    ///
    /// Requests already taken by a worker are completed; callers still queued
    /// and any later submission receive [`DispatchError::ShutDown`].
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Whether [`shutdown`](Dispatcher::shutdown) has been called.
    ///
    /// A dispatcher whose workers all died is not shut down; its submissions
    /// fail with [`DispatchError::NoWorkers`] instead.
    pub fn is_shut_down(&self) -> bool {
        self.pool.is_shutting_down()
    }

    /// Number of requests taken by worker `worker` so far.
    pub fn worker_processed(&self, worker: usize) -> Option<u64> {
        self.pool.processed(worker)
    }

    pub fn worker_state(&self, worker: usize) -> Option<WorkerState> {
        self.pool.state(worker)
    }

    pub fn workers(&self) -> usize {
        self.pool.len()
    }

    /// Number of workers neither stopped nor dead.
    pub fn live_workers(&self) -> usize {
        self.pool.live()
    }

    pub fn mode(&self) -> InferenceMode {
        self.config.mode
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.config.labels.as_deref()
    }

    /// Number of requests waiting in the dispatch queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The effective configuration, with the worker count resolved.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The prototype model the workers were replicated from.
    pub fn model(&self) -> &E {
        &self.model
    }

    async fn dispatch(&self, inputs: Vec<T>) -> Result<Notification<T>, DispatchError> {
        if inputs.is_empty() {
            return Err(DispatchError::EmptyInput);
        }
        let (completion, notification) = channel();

        match &self.assembler {
            None => {
                let rows = inputs.first()
                    .and_then(|tensor| batch_rows(tensor).ok())
                    .unwrap_or(0);
                let request = ObservableRequest::single(Contribution::new(inputs, rows, completion));
                self.queue.enqueue(Arc::new(request)).await?;
            }
            Some(assembler) => {
                let rows = leading_rows(&inputs)?;
                assembler.merge(Contribution::new(inputs, rows, completion)).await?;
            }
        }
        Ok(notification)
    }
}

/// Checks that every input has a batch dimension, all of the same size.
fn leading_rows<T: Backend>(inputs: &[T]) -> Result<usize, DispatchError> {
    let mut expected = None;
    for (position, tensor) in inputs.iter().enumerate() {
        let rows = batch_rows(tensor).map_err(|_| {
            DispatchError::InvalidInput(format!("input {position} has no batch dimension"))
        })?;
        match expected {
            None => expected = Some(rows),
            Some(first) if first != rows => {
                return Err(DispatchError::InvalidInput(format!(
                    "input {position} has {rows} rows, input 0 has {first}"
                )));
            }
            Some(_) => {}
        }
    }
    expected.ok_or(DispatchError::EmptyInput)
}

fn first_output<T>(outcome: Outcome<T>) -> Result<T, DispatchError> {
    outcome?.into_iter().next().ok_or(DispatchError::MissingOutput)
}
