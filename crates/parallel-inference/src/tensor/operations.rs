use crate::backend::Backend;
use crate::error::BackendError;
use super::constant::BATCH_DIM;

/// Returns the leading (batch) dimension of `tensor`.
pub(crate) fn batch_rows<B>(tensor: &B) -> Result<usize, BackendError>
where B: Backend
{
    tensor.shape()
        .first()
        .copied()
        .ok_or(BackendError::MissingBatchDimension)
}

/// Concatenates tensors along the batch dimension, in the order supplied.
///
/// Every tensor must have rank >= 1 and the same trailing dimensions as the
/// first one. Shapes are checked here so that no backend is asked to perform
/// a concatenation it would panic on.
pub(crate) fn concat_along_batch<B>(tensors: &[B]) -> Result<B, BackendError>
where B: Backend
{
    let first = tensors.first().ok_or(BackendError::EmptyConcat)?;
    if tensors.len() == 1 {
        return Ok(first.clone());
    }

    let expected = first.shape();
    if expected.is_empty() {
        return Err(BackendError::MissingBatchDimension);
    }
    for tensor in &tensors[1..] {
        let actual = tensor.shape();
        if actual.len() != expected.len() || actual[1..] != expected[1..] {
            return Err(BackendError::ShapeMismatch { expected, actual });
        }
    }
    B::cat(tensors, BATCH_DIM)
}

/// Splits `tensor` along the batch dimension into consecutive pieces of
/// `rows[i]` rows each.
///
/// # Returns
///
/// One tensor per entry of `rows`, in order. The leading dimension of
/// `tensor` must equal the sum of `rows`.
pub(crate) fn split_along_batch<B>(tensor: &B, rows: &[usize]) -> Result<Vec<B>, BackendError>
where B: Backend
{
    let total: usize = rows.iter().sum();
    let size = batch_rows(tensor)?;
    if size != total {
        return Err(BackendError::OutOfBounds {
            dim: BATCH_DIM,
            start: 0,
            end: total,
            size,
        });
    }

    let mut offset = 0;
    let mut pieces = Vec::with_capacity(rows.len());
    for &len in rows {
        pieces.push(tensor.slice(BATCH_DIM, offset, len)?);
        offset += len;
    }
    Ok(pieces)
}
