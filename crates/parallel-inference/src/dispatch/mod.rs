//! # Dispatch
//!
//! The caller-facing surface: configuration, the builder, and the
//! [`Dispatcher`] itself.
//!
//! A [`Dispatcher`] is built once around a prototype model and then shared
//! between callers, typically behind an `Arc`. It can be driven from async
//! tasks through [`Dispatcher::submit`] or from plain threads through
//! [`Dispatcher::submit_blocking`].
//!
//! # Example
//!
//! ```ignore
//! use parallel_inference::{Dispatcher, InferenceMode};
//!
//! let dispatcher = Dispatcher::builder(model)
//!     .mode(InferenceMode::Batched)
//!     .batch_limit(16)
//!     .build()?;
//!
//! // from any thread
//! let logits = dispatcher.submit_one_blocking(image)?;
//! ```
mod builder;
mod config;
mod dispatcher;

pub use builder::DispatcherBuilder;
pub use config::{DispatcherConfig, InferenceMode};
pub use dispatcher::Dispatcher;
