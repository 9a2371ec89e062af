use std::fmt::Debug;
use crate::error::BackendError;

/// The backend trait that must be fulfilled by any tensor type the dispatcher carries.
///
/// Only the operations needed to assemble and split batches are required;
/// everything else a model does with its tensors stays inside the
/// [`ComputeEngine`](crate::engine::ComputeEngine).
pub trait Backend: Debug + Clone + Send + Sync + 'static {
    /// Return the shape of this tensor
    fn shape(&self) -> Vec<usize>;

    /// Concatenate several tensors to each other along dimension `dim`, in the order supplied
    fn cat(tensors: &[Self], dim: usize) -> Result<Self, BackendError>;

    /// Slice a given `dim` from `start` to `start + len`
    fn slice(&self, dim: usize, start: usize, len: usize) -> Result<Self, BackendError>;
}
