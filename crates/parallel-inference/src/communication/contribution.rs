use super::notification::Completion;

/// # Contribution
///
/// One caller's share of an [`ObservableRequest`](super::ObservableRequest):
/// its input tensors, the number of batch rows those inputs carry, and the
/// completion handle that releases the caller.
///
/// In a batched request, `rows` is what lets the aggregate output be split
/// back per caller in merge order.
pub(crate) struct Contribution<T> {
    /// The input tensors, positionally ordered
    inputs: Vec<T>,

    /// Leading-dimension size shared by every input
    rows: usize,

    /// Channel for sending results back to the caller
    completion: Completion<T>
}

impl<T> Contribution<T> {
    pub fn new(inputs: Vec<T>, rows: usize, completion: Completion<T>) -> Self {
        Self {
            inputs,
            rows,
            completion
        }
    }

    /// Returns a reference to the input tensors.
    pub fn inputs(&self) -> &[T] {
        &self.inputs
    }

    /// Splits the contribution into inputs, row count and completion handle.
    pub fn into_parts(self) -> (Vec<T>, usize, Completion<T>) {
        (self.inputs, self.rows, self.completion)
    }
}
