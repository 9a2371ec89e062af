//! # Parallel Inference
//!
//! Replicated, optionally batched inference dispatch over a pool of worker
//! threads.
//!
//! ## Overview
//!
//! A trained model is handed to a [`Dispatcher`] once. The dispatcher starts
//! a fixed number of worker threads, each of which builds its own replica of
//! the model and copies the prototype's parameters into it. Callers then
//! submit input tensors from any thread; their requests travel through a
//! bounded queue to whichever worker is free, and each caller is released
//! with its own outputs once the forward pass completes.
//!
//! ### Assumptions
//! Regardless of backend used, the `0th` dimension of every tensor is
//! reserved as the batch dimension. It is only interpreted in batched mode.
//!
//! ### Backend Traits
//!
//! The [`Backend`](backend::Backend) trait defines the few tensor operations
//! batching needs: reading a shape, concatenating and slicing along a
//! dimension. This keeps the dispatch logic independent of the tensor library.
//!
//! ### Compute Engines
//!
//! The [`ComputeEngine`](engine::ComputeEngine) trait is the only thing a
//! model has to implement: replication, a parameter snapshot, an optional
//! synchronization point, and the forward pass itself.
//!
//! ### Modes
//!
//! - **Sequential** - every submission is its own forward pass
//! - **Batched** - concurrent submissions are merged along the batch dimension,
//!   up to a configured number of callers, and the outputs are split back per caller
//!
//! ## Features
//!
//! - **candle** - Enables candle backend
//! - **burn** - Enables burn backend
//!

mod communication;
mod core;
mod tensor;

pub mod backend;
pub mod dispatch;
pub mod engine;
pub mod error;

/// Constants for client reference
pub use tensor::constant;

pub use crate::communication::RequestKind;
pub use crate::core::WorkerState;
pub use dispatch::{Dispatcher, DispatcherBuilder, DispatcherConfig, InferenceMode};

#[cfg(test)]
mod testing;
