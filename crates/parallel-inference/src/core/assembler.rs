use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use crate::backend::Backend;
use crate::communication::{Contribution, ObservableRequest};
use crate::error::DispatchError;
use super::queue::DispatchQueue;

/// # BatchAssembler
///
/// Merges concurrent callers into shared batched requests.
///
/// The assembler keeps one open batch. A caller joins it while it is
/// unlocked, under the batch limit and shape-compatible; the limit is a hard
/// cutoff. Otherwise a fresh batch is opened with the caller as its first
/// member and enqueued right away, so a batch is visible to workers from
/// the moment it exists and keeps accepting callers until a worker locks it.
pub(crate) struct BatchAssembler<T> {
    batch_limit: usize,
    queue: DispatchQueue<T>,
    current: Mutex<Option<Arc<ObservableRequest<T>>>>,
}

impl<T> BatchAssembler<T>
where T: Backend
{
    pub fn new(batch_limit: usize, queue: DispatchQueue<T>) -> Self {
        Self {
            batch_limit,
            queue,
            current: Mutex::new(None),
        }
    }

    /// Places `contribution` into the open batch, or into a new one.
    ///
    /// Waits for queue capacity while holding the assembler lock when a new
    /// batch has to be enqueued, which stalls other callers as well.
    ///
    /// # Returns
    ///
    /// The (possibly shared) request the caller was merged into
    pub async fn merge(&self, contribution: Contribution<T>) -> Result<Arc<ObservableRequest<T>>, DispatchError> {
        let mut current = self.current.lock().await;

        let contribution = match current.as_ref() {
            None => contribution,
            Some(open) => match open.try_merge(contribution) {
                Ok(merged) => {
                    debug!(request = %open.id(), merged, "caller joined open batch");
                    return Ok(open.clone());
                }
                Err((reason, contribution)) => {
                    debug!(request = %open.id(), ?reason, "open batch rejected caller");
                    contribution
                }
            },
        };

        let batch = Arc::new(ObservableRequest::batched(contribution, self.batch_limit));
        debug!(request = %batch.id(), limit = self.batch_limit, "opened new batch");
        if let Err(error) = self.queue.enqueue(batch.clone()).await {
            *current = None;
            return Err(error);
        }
        *current = Some(batch.clone());
        Ok(batch)
    }
}
