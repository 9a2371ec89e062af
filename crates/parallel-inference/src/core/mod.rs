//! # Dispatch Core
//!
//! The moving parts between a submitted request and its result.
//!
//! ## Module Structure
//!
//! * [`queue`] - The bounded FIFO between the submission paths and the workers.
//!   A full queue makes submitters wait; nothing is dropped.
//!
//! * [`assembler`] - Merges concurrent batched submissions into one open request,
//!   up to the batch limit, and enqueues each new request as soon as it opens.
//!
//! * [`worker`] - One thread per model replica. Each worker replicates the
//!   prototype engine, then dequeues, computes and releases callers serially.
//!
//! * [`pill`] - The drop guard every worker thread carries, which records how the
//!   worker ended and closes the queue once the last worker is gone.
//!
//! * [`pool`] - Starts the workers, waits for replication, and joins them on shutdown.
//!
pub(crate) mod assembler;
pub(crate) mod pill;
pub(crate) mod pool;
pub(crate) mod queue;
pub(crate) mod worker;

pub use worker::WorkerState;
