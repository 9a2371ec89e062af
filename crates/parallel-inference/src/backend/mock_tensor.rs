use std::fmt;
use crate::backend::Backend;
use crate::error::BackendError;

// A simple row-major tensor implementation for testing
#[derive(Clone, Debug, PartialEq)]
pub struct MockTensor {
    pub(crate) shape: Vec<usize>,
    pub(crate) data: Vec<i64>,
}

impl MockTensor {
    pub fn new(shape: Vec<usize>, data: Vec<i64>) -> Self {
        assert_eq!(shape.iter().product::<usize>(), data.len(), "shape does not match data");
        Self { shape, data }
    }

    /// A `[rows.len(), 1]` column holding the given values.
    pub fn column(rows: &[i64]) -> Self {
        Self::new(vec![rows.len(), 1], rows.to_vec())
    }

    pub fn map(&self, f: impl Fn(i64) -> i64) -> Self {
        Self::new(self.shape.clone(), self.data.iter().map(|v| f(*v)).collect())
    }

    // number of elements before and after `dim` in row-major order
    fn strides(&self, dim: usize) -> (usize, usize) {
        let outer = self.shape[..dim].iter().product();
        let inner = self.shape[dim + 1..].iter().product();
        (outer, inner)
    }
}

impl fmt::Display for MockTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockTensor({:?}, {:?})", self.shape, self.data)
    }
}

impl Backend for MockTensor {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self, BackendError> {
        let first = tensors.first().ok_or(BackendError::EmptyConcat)?;
        let (outer, inner) = first.strides(dim);

        let mut shape = first.shape.clone();
        shape[dim] = tensors.iter().map(|t| t.shape[dim]).sum();

        let mut data = Vec::with_capacity(shape.iter().product());
        for o in 0..outer {
            for t in tensors {
                let block = t.shape[dim] * inner;
                data.extend_from_slice(&t.data[o * block..(o + 1) * block]);
            }
        }
        Ok(MockTensor::new(shape, data))
    }

    fn slice(&self, dim: usize, start: usize, len: usize) -> Result<Self, BackendError> {
        if start + len > self.shape[dim] {
            return Err(BackendError::OutOfBounds {
                dim,
                start,
                end: start + len,
                size: self.shape[dim],
            });
        }
        let (outer, inner) = self.strides(dim);
        let block = self.shape[dim] * inner;

        let mut data = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let base = o * block + start * inner;
            data.extend_from_slice(&self.data[base..base + len * inner]);
        }
        let mut shape = self.shape.clone();
        shape[dim] = len;
        Ok(MockTensor::new(shape, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat_inner_dimension() {
        let a = MockTensor::new(vec![2, 1], vec![1, 2]);
        let b = MockTensor::new(vec![2, 2], vec![3, 4, 5, 6]);

        let out = MockTensor::cat(&[a, b], 1).unwrap();
        assert_eq!(out, MockTensor::new(vec![2, 3], vec![1, 3, 4, 2, 5, 6]));
    }

    #[test]
    fn test_slice_inner_dimension() {
        let t = MockTensor::new(vec![2, 3], vec![1, 2, 3, 4, 5, 6]);

        let out = t.slice(1, 1, 2).unwrap();
        assert_eq!(out, MockTensor::new(vec![2, 2], vec![2, 3, 5, 6]));
    }
}
