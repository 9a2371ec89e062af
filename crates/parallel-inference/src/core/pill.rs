use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tokio::sync::watch;
use tracing::{error, warn};
use crate::backend::Backend;
use crate::error::DispatchError;
use super::queue::DispatchQueue;
use super::worker::{WorkerState, WorkerStatus};

/// # Pill
///
/// Held by every worker thread for its whole life, so that its exit is
/// observable no matter how the thread ends.
///
/// ## Purpose
///
/// When a worker panics, unwinding drops its in-flight batch (releasing those
/// callers with [`DispatchError::Abandoned`]) and then this pill. The pill
/// uses `thread::panicking()` to tell a panic from a normal exit and records
/// [`WorkerState::Dead`] or [`WorkerState::Stopped`] accordingly, so
/// `shutdown()` never waits on a worker that silently disappeared.
///
/// The pill of the last live worker also closes and drains the dispatch
/// queue: with nobody left to consume it, queued callers are released with
/// [`DispatchError::NoWorkers`] (or [`DispatchError::ShutDown`] during a
/// shutdown) instead of waiting forever.
pub(crate) struct Pill<T>
where T: Backend
{
    worker: usize,
    status: Arc<WorkerStatus>,
    live: Arc<AtomicUsize>,
    queue: DispatchQueue<T>,
    shutdown: watch::Receiver<bool>,
}

impl<T> Pill<T>
where T: Backend
{
    pub fn new(
        worker: usize,
        status: Arc<WorkerStatus>,
        live: Arc<AtomicUsize>,
        queue: DispatchQueue<T>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { worker, status, live, queue, shutdown }
    }
}

impl<T> Drop for Pill<T>
where T: Backend
{
    fn drop(&mut self) {
        if thread::panicking() {
            self.status.set(WorkerState::Dead);
            error!(worker = self.worker, "worker panicked; its in-flight request was abandoned");
        } else if self.status.state() != WorkerState::Dead {
            self.status.set(WorkerState::Stopped);
        }

        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            let reason = if *self.shutdown.borrow() {
                DispatchError::ShutDown
            } else {
                DispatchError::NoWorkers
            };
            let released = self.queue.close_and_drain(reason);
            if released > 0 {
                warn!(released, "last worker exited; queued callers released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_tensor::MockTensor;
    use crate::communication::{channel, Contribution, ObservableRequest};

    fn pill(
        status: &Arc<WorkerStatus>,
        live: &Arc<AtomicUsize>,
        queue: &DispatchQueue<MockTensor>,
        shutdown: &watch::Receiver<bool>,
    ) -> Pill<MockTensor> {
        Pill::new(0, status.clone(), live.clone(), queue.clone(), shutdown.clone())
    }

    #[test]
    fn test_normal_exit_marks_stopped() {
        let status = Arc::new(WorkerStatus::default());
        let live = Arc::new(AtomicUsize::new(2));
        let queue = DispatchQueue::<MockTensor>::bounded(1);
        let (_tx, rx) = watch::channel(false);

        status.set(WorkerState::Draining);
        drop(pill(&status, &live, &queue, &rx));

        assert_eq!(status.state(), WorkerState::Stopped);
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert!(!queue.is_closed());
    }

    #[test]
    fn test_panic_marks_dead() {
        let status = Arc::new(WorkerStatus::default());
        let live = Arc::new(AtomicUsize::new(2));
        let queue = DispatchQueue::<MockTensor>::bounded(1);
        let (_tx, rx) = watch::channel(false);

        let handle = {
            let p = pill(&status, &live, &queue, &rx);
            thread::spawn(move || {
                let _pill = p;
                panic!("Intentional panic in worker thread");
            })
        };

        assert!(handle.join().is_err());
        assert_eq!(status.state(), WorkerState::Dead);
    }

    #[test]
    fn test_replication_failure_stays_dead() {
        let status = Arc::new(WorkerStatus::default());
        let live = Arc::new(AtomicUsize::new(2));
        let queue = DispatchQueue::<MockTensor>::bounded(1);
        let (_tx, rx) = watch::channel(false);

        status.set(WorkerState::Dead);
        drop(pill(&status, &live, &queue, &rx));
        assert_eq!(status.state(), WorkerState::Dead);
    }

    #[tokio::test]
    async fn test_last_worker_drains_queue() {
        let status = Arc::new(WorkerStatus::default());
        let live = Arc::new(AtomicUsize::new(1));
        let queue = DispatchQueue::<MockTensor>::bounded(2);
        let (_tx, rx) = watch::channel(false);

        let (completion, notification) = channel();
        let contribution = Contribution::new(vec![MockTensor::column(&[1])], 1, completion);
        queue.enqueue(Arc::new(ObservableRequest::single(contribution))).await.unwrap();

        drop(pill(&status, &live, &queue, &rx));
        assert!(queue.is_closed());
        assert_eq!(notification.await, Err(DispatchError::NoWorkers));
    }
}
