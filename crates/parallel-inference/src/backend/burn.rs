//! The burn implementation for backend provision.
//! Since burn Tensor are constrained with const generics, we must macro apply the
//! core operations for each supported rank
use super::Backend;
use crate::error::BackendError;
use burn::prelude::{Tensor, Backend as BurnBackend};
use burn::tensor::BasicOps;

macro_rules! impl_core_tensor_ops {
    ($d:literal) => {
        impl <B, K> Backend for Tensor<B, $d, K>
        where B: BurnBackend,
        K: BasicOps<B> + 'static {

            fn shape(&self) -> Vec<usize> {
                self.dims().to_vec()
            }

            fn cat(tensors: &[Self], dim: usize) -> Result<Self, BackendError> {
                if tensors.is_empty() {
                    return Err(BackendError::EmptyConcat);
                }
                let owned: Vec<_> = tensors.to_vec();
                Ok(Tensor::cat(owned, dim))
            }

            fn slice(&self, dim: usize, start: usize, len: usize) -> Result<Self, BackendError> {
                let dims = self.dims();
                // burn panics on an out of range narrow
                if dim >= dims.len() || start + len > dims[dim] {
                    return Err(BackendError::OutOfBounds {
                        dim,
                        start,
                        end: start + len,
                        size: dims.get(dim).copied().unwrap_or(0),
                    });
                }
                Ok(self.clone().narrow(dim, start, len))
            }
        }
    }
}

impl_core_tensor_ops!(1);
impl_core_tensor_ops!(2);
impl_core_tensor_ops!(3);
impl_core_tensor_ops!(4);
impl_core_tensor_ops!(5);
impl_core_tensor_ops!(6);
impl_core_tensor_ops!(7);
impl_core_tensor_ops!(8);

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_cat_and_slice_rank_two() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device);
        let b = Tensor::<TestBackend, 2>::from_floats([[3.0, 4.0], [5.0, 6.0]], &device);

        let joined = <Tensor<TestBackend, 2> as Backend>::cat(&[a, b], 0).unwrap();
        assert_eq!(Backend::shape(&joined), vec![3, 2]);

        let tail = Backend::slice(&joined, 0, 1, 2).unwrap();
        assert_eq!(tail.into_data().to_vec::<f32>().unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_slice_out_of_range_is_error() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0], &device);

        let err = Backend::slice(&t, 0, 1, 4).unwrap_err();
        assert_eq!(err, BackendError::OutOfBounds { dim: 0, start: 1, end: 5, size: 2 });
    }
}
