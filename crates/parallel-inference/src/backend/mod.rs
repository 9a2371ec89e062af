//! # Tensor Backend
//!
//! This module provides a unified interface for different tensor backends,
//! allowing the dispatcher to assemble and split batches in a backend-agnostic manner

//! ## Feature Flags
//!
//! The module uses feature flags to conditionally compile support for different backends:
//!
//! - `candle`: Enables support for the Candle tensor library
//! - `burn`: Enables support for the Burn tensor library
//!
//! ## Usage
//!
//! Users of this crate can work with tensors in a backend-agnostic way by:
//!
//! 1. Importing the [`Backend`] trait
//! 2. Writing their [`ComputeEngine`](crate::engine::ComputeEngine) against a concrete tensor type
//! 3. Enabling the appropriate feature flag for their desired backend

mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle tensor backend implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
/// It implements [`Backend`] for Candle's `Tensor` type.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "burn")))]
#[cfg(feature = "burn")]
/// Burn tensor backend implementation.
///
/// This module is only available when the `burn` feature flag is enabled.
/// Burn tensors carry their rank as a const generic, so [`Backend`] is
/// implemented for every rank from 1 through 8.
pub mod burn;


// Re-export the core trait for convenient imports
pub use core_trait::*;


#[cfg(test)]
/// Mock tensor implementation.
///
/// Operates on simple row-major integer tensors
pub(crate) mod mock_tensor;
