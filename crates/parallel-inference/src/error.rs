//! Error types surfaced by the dispatcher.
//!
//! Every error is `Clone` because a single failure (a computation error, a
//! shutdown, a dead pool) is fanned out to every caller merged into the
//! affected request.

use thiserror::Error;

/// Invalid construction parameters, rejected before any worker starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("workers should be a positive value, got {0}")]
    Workers(usize),

    #[error("batch limit should be a positive value, got {0}")]
    BatchLimit(usize),

    #[error("queue limit should be a positive value, got {0}")]
    QueueLimit(usize),
}

/// Failures reported by a [`ComputeEngine`](crate::engine::ComputeEngine).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not build or initialize a replica.
    #[error("replica initialization failed: {0}")]
    Initialization(String),

    /// A parameter snapshot could not be loaded into a replica.
    #[error("parameter load failed: {0}")]
    Parameters(String),

    /// Outstanding asynchronous work on the prototype could not be flushed.
    #[error("engine synchronization failed: {0}")]
    Synchronization(String),

    /// The forward pass itself failed.
    #[error("forward pass failed: {0}")]
    Forward(String),
}

/// Shape errors raised while concatenating or splitting batches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("cannot concatenate an empty tensor list")]
    EmptyConcat,

    #[error("tensor of rank 0 has no batch dimension")]
    MissingBatchDimension,

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("range {start}..{end} out of bounds for dimension {dim} of size {size}")]
    OutOfBounds {
        dim: usize,
        start: usize,
        end: usize,
        size: usize,
    },

    /// Error raised by the underlying tensor library.
    #[error("tensor operation failed: {0}")]
    Tensor(String),
}

/// Everything a caller of [`Dispatcher`](crate::dispatch::Dispatcher) can observe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("submission requires at least one input tensor")]
    EmptyInput,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The dispatch queue was closed by `shutdown()` while, or before, the
    /// request was enqueued.
    #[error("dispatcher has been shut down")]
    ShutDown,

    /// Every worker has died; nothing is left to drain the queue.
    #[error("no live workers remain in the pool")]
    NoWorkers,

    #[error("worker {worker} failed to replicate the model: {source}")]
    Replication {
        worker: usize,
        #[source]
        source: EngineError,
    },

    #[error("worker {worker} could not be started: {reason}")]
    WorkerSpawn { worker: usize, reason: String },

    #[error("computation failed: {0}")]
    Computation(EngineError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("model returned {actual} rows for a batch of {expected}")]
    OutputRows { expected: usize, actual: usize },

    #[error("model returned no output tensor")]
    MissingOutput,

    /// The request was dropped without an outcome, e.g. its worker panicked.
    #[error("request was abandoned before completion")]
    Abandoned,
}
