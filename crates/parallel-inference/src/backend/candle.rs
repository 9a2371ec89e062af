use super::Backend;
use crate::error::BackendError;
use candle_core::Tensor;

impl Backend for Tensor {
    fn shape(&self) -> Vec<usize> {
        self.dims().to_vec()
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self, BackendError> {
        if tensors.is_empty() {
            return Err(BackendError::EmptyConcat);
        }
        Tensor::cat(tensors, dim).map_err(|e| BackendError::Tensor(e.to_string()))
    }

    fn slice(&self, dim: usize, start: usize, len: usize) -> Result<Self, BackendError> {
        self.narrow(dim, start, len)
            .map_err(|e| BackendError::Tensor(e.to_string()))
    }
}
