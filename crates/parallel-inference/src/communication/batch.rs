use tracing::debug;
use crate::backend::Backend;
use crate::error::DispatchError;
use crate::tensor::operations::{batch_rows, concat_along_batch, split_along_batch};
use super::contribution::Contribution;
use super::notification::Completion;
use super::observable::RequestKind;

/// The callers of one locked request, waiting on a single forward pass.
///
/// A `Batch` owns every completion handle of the request. Dropping it
/// without delivering releases all callers with
/// [`DispatchError::Abandoned`], which is what happens when a worker
/// panics mid-computation.
pub(crate) struct Batch<T> {
    kind: RequestKind,

    /// Batch rows contributed by each caller, in merge order
    rows: Vec<usize>,

    completions: Vec<Completion<T>>,
}

impl<T> Batch<T>
where T: Backend
{
    /// Builds the engine inputs from the contributions of a locked request.
    ///
    /// Single requests pass their inputs through untouched. Batched requests
    /// concatenate each input position across callers along the batch
    /// dimension, in merge order.
    ///
    /// # Returns
    ///
    /// The batch and the engine inputs, or `None` if there was nothing to
    /// compute (the request was already taken, or assembling failed and the
    /// callers were released with the error)
    pub fn assemble(kind: RequestKind, contributions: Vec<Contribution<T>>) -> Option<(Self, Vec<T>)> {
        if contributions.is_empty() {
            return None;
        }

        let mut rows = Vec::with_capacity(contributions.len());
        let mut completions = Vec::with_capacity(contributions.len());
        let mut per_caller = Vec::with_capacity(contributions.len());
        for contribution in contributions {
            let (inputs, count, completion) = contribution.into_parts();
            rows.push(count);
            completions.push(completion);
            per_caller.push(inputs);
        }
        let batch = Self { kind, rows, completions };

        if per_caller.len() == 1 {
            let inputs = per_caller.pop()?;
            return Some((batch, inputs));
        }
        match gather(per_caller) {
            Ok(inputs) => Some((batch, inputs)),
            Err(error) => {
                batch.fail(error);
                None
            }
        }
    }

    /// Number of callers waiting on this batch.
    pub fn callers(&self) -> usize {
        self.completions.len()
    }

    /// Total batch rows across all callers.
    pub fn total_rows(&self) -> usize {
        self.rows.iter().sum()
    }

    /// Hands each caller its slice of `outputs`.
    ///
    /// With a single caller the outputs are delivered unmodified. Otherwise
    /// every output is split along the batch dimension by the recorded row
    /// counts; if an output does not carry exactly the batch's rows, every
    /// caller is released with [`DispatchError::OutputRows`] instead.
    pub fn deliver(self, outputs: Vec<T>) {
        if self.kind == RequestKind::Single || self.completions.len() == 1 {
            if let Some(completion) = self.completions.into_iter().next() {
                if !completion.complete(Ok(outputs)) {
                    debug!("caller stopped waiting before its output was ready");
                }
            }
            return;
        }

        match scatter(&outputs, &self.rows) {
            Ok(per_caller) => {
                for (completion, slice) in self.completions.into_iter().zip(per_caller) {
                    if !completion.complete(Ok(slice)) {
                        debug!("caller stopped waiting before its output was ready");
                    }
                }
            }
            Err(error) => self.fail(error),
        }
    }

    /// Releases every caller with `error`.
    pub fn fail(self, error: DispatchError) {
        for completion in self.completions {
            completion.complete(Err(error.clone()));
        }
    }
}

fn gather<T: Backend>(per_caller: Vec<Vec<T>>) -> Result<Vec<T>, DispatchError> {
    let arity = per_caller.first().map_or(0, Vec::len);
    let mut columns: Vec<Vec<T>> = (0..arity)
        .map(|_| Vec::with_capacity(per_caller.len()))
        .collect();
    for inputs in per_caller {
        for (column, tensor) in columns.iter_mut().zip(inputs) {
            column.push(tensor);
        }
    }
    columns.iter()
        .map(|column| concat_along_batch(column).map_err(DispatchError::from))
        .collect()
}

fn scatter<T: Backend>(outputs: &[T], rows: &[usize]) -> Result<Vec<Vec<T>>, DispatchError> {
    let expected: usize = rows.iter().sum();
    let mut per_caller: Vec<Vec<T>> = rows.iter()
        .map(|_| Vec::with_capacity(outputs.len()))
        .collect();
    for output in outputs {
        let actual = batch_rows(output)?;
        if actual != expected {
            return Err(DispatchError::OutputRows { expected, actual });
        }
        for (caller, piece) in per_caller.iter_mut().zip(split_along_batch(output, rows)?) {
            caller.push(piece);
        }
    }
    Ok(per_caller)
}
