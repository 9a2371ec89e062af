use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use crate::error::DispatchError;

/// The result delivered to one caller: its slice of the model outputs.
pub(crate) type Outcome<T> = Result<Vec<T>, DispatchError>;

/// Creates a linked completion/notification pair for one caller.
pub(crate) fn channel<T>() -> (Completion<T>, Notification<T>) {
    let (sender, receiver) = oneshot::channel();
    (Completion { sender }, Notification { receiver })
}

/// # Completion
///
/// The signaling side of a notification handle, registered on exactly one
/// [`ObservableRequest`](super::ObservableRequest).
///
/// [`complete`](Completion::complete) consumes the handle, so a caller can be
/// released at most once. Dropping a completion without calling it releases
/// the caller with [`DispatchError::Abandoned`].
#[derive(Debug)]
pub(crate) struct Completion<T> {
    sender: oneshot::Sender<Outcome<T>>
}

impl<T> Completion<T> {
    /// Releases the waiting caller with `outcome`.
    ///
    /// # Returns
    ///
    /// `false` if the caller stopped waiting before the outcome arrived
    pub fn complete(self, outcome: Outcome<T>) -> bool {
        self.sender.send(outcome).is_ok()
    }
}

/// # Notification
///
/// The waiting side of a notification handle. Resolves once the worker
/// processing the caller's request signals it.
pub(crate) struct Notification<T> {
    receiver: oneshot::Receiver<Outcome<T>>
}

impl<T> Notification<T> {
    /// Blocks the current thread until the outcome is available.
    pub fn wait(self) -> Outcome<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Notification<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DispatchError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
