use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use crate::backend::Backend;
use crate::communication::ObservableRequest;
use crate::error::DispatchError;

type Request<T> = Arc<ObservableRequest<T>>;

/// # DispatchQueue
///
/// A bounded FIFO of [`ObservableRequest`]s between the submission paths and
/// the worker pool.
///
/// Producers wait in [`enqueue`](DispatchQueue::enqueue) while the queue is
/// full; this is the dispatcher's only admission control, nothing is ever
/// dropped. The single tokio receiver is shared by every worker behind a
/// mutex, which keeps dequeue order FIFO across consumers.
pub(crate) struct DispatchQueue<T> {
    sender: mpsc::Sender<Request<T>>,
    receiver: Arc<Mutex<mpsc::Receiver<Request<T>>>>,

    /// Why the queue was closed; the first reason recorded wins
    closed: Arc<OnceLock<DispatchError>>,
}

impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> DispatchQueue<T>
where T: Backend
{
    /// Creates a queue holding at most `capacity` requests.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            closed: Arc::new(OnceLock::new()),
        }
    }

    /// Appends `request`, waiting for room if the queue is full.
    ///
    /// # Returns
    ///
    /// The reason the queue was closed, if it was closed before or while waiting
    pub async fn enqueue(&self, request: Request<T>) -> Result<(), DispatchError> {
        let id = request.id();
        match self.sender.send(request).await {
            Ok(()) => {
                debug!(request = %id, "request enqueued");
                Ok(())
            }
            Err(_) => Err(self.closed_reason()),
        }
    }

    /// Takes the oldest request, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<Request<T>> {
        self.receiver.lock().await.recv().await
    }

    /// Number of requests currently waiting.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Closes the queue and releases every request still buffered with `reason`.
    ///
    /// Producers waiting for room are woken with the recorded reason. Must
    /// only be called once no worker is dequeuing.
    ///
    /// # Returns
    ///
    /// The number of callers released
    pub fn close_and_drain(&self, reason: DispatchError) -> usize {
        let _ = self.closed.set(reason);
        let reason = self.closed_reason();

        let Ok(mut receiver) = self.receiver.try_lock() else {
            warn!("dispatch queue still has a consumer; leaving it open");
            return 0;
        };
        receiver.close();

        let mut released = 0;
        while let Ok(request) = receiver.try_recv() {
            released += request.fail(reason.clone());
        }
        released
    }

    fn closed_reason(&self) -> DispatchError {
        self.closed.get().cloned().unwrap_or(DispatchError::ShutDown)
    }
}
