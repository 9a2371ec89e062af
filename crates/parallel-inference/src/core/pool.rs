use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use crate::backend::Backend;
use crate::engine::{ComputeEngine, ReplicationBarrier};
use crate::error::{DispatchError, EngineError};
use super::queue::DispatchQueue;
use super::worker::{Worker, WorkerState, WorkerStatus};

/// A handle for one worker thread of the pool.
///
/// Keeps the worker's shared status for diagnostics and its join handle,
/// which becomes `None` once the thread has been joined.
struct WorkerHandle {
    id: usize,
    status: Arc<WorkerStatus>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    fn join(&self) {
        let thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                debug!(worker = self.id, "joined a worker that panicked");
            }
        }
    }
}

/// # WorkerPool
///
/// A fixed set of worker threads, each owning one replica of the prototype
/// engine and pulling requests from the shared [`DispatchQueue`].
pub(crate) struct WorkerPool<T> {
    handles: Vec<WorkerHandle>,
    shutdown: watch::Sender<bool>,
    queue: DispatchQueue<T>,
}

impl<T> WorkerPool<T>
where T: Backend
{
    /// Spawns `workers` threads and waits until every one of them has
    /// replicated the prototype.
    ///
    /// # Returns
    ///
    /// The running pool, or the first startup failure; in that case every
    /// worker that did start is shut down again before returning
    pub fn start<E>(
        prototype: Arc<E>,
        workers: usize,
        queue: DispatchQueue<T>,
        batch_wait: Duration,
    ) -> Result<Self, DispatchError>
    where E: ComputeEngine<T>
    {
        let (shutdown, signal) = watch::channel(false);
        let barrier = Arc::new(ReplicationBarrier::new());
        let live = Arc::new(AtomicUsize::new(workers));
        let (ready_tx, ready_rx) = mpsc::channel();

        let mut pool = Self {
            handles: Vec::with_capacity(workers),
            shutdown,
            queue: queue.clone(),
        };

        for id in 0..workers {
            let status = Arc::new(WorkerStatus::default());
            let worker = Worker {
                id,
                prototype: prototype.clone(),
                barrier: barrier.clone(),
                queue: queue.clone(),
                status: status.clone(),
                shutdown: signal.clone(),
                batch_wait,
            };
            match worker.spawn(ready_tx.clone(), live.clone()) {
                Ok(thread) => pool.handles.push(WorkerHandle {
                    id,
                    status,
                    thread: Mutex::new(Some(thread)),
                }),
                Err(error) => {
                    live.fetch_sub(workers - id, Ordering::SeqCst);
                    pool.shutdown();
                    return Err(error);
                }
            }
        }
        drop(ready_tx);

        for _ in 0..workers {
            let failure = match ready_rx.recv() {
                Ok((_, Ok(()))) => continue,
                Ok((_, Err(error))) => Some(error),
                // a worker went away without reporting, i.e. it panicked while replicating
                Err(_) => None,
            };
            pool.shutdown();
            return Err(failure.unwrap_or_else(|| DispatchError::Replication {
                worker: pool.first_dead().unwrap_or_default(),
                source: EngineError::Initialization("worker panicked during replication".into()),
            }));
        }

        info!(workers, "worker pool ready");
        Ok(pool)
    }

    /// Stops every worker and waits for their threads to exit.
    ///
    /// Workers finish the request they are processing, if any. Afterwards the
    /// queue is closed and callers still queued are released with
    /// [`DispatchError::ShutDown`]. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let already = self.shutdown.send_replace(true);

        for handle in &self.handles {
            handle.join();
        }
        // the last worker to exit normally closes the queue itself
        if !self.queue.is_closed() {
            let released = self.queue.close_and_drain(DispatchError::ShutDown);
            if released > 0 {
                warn!(released, "released queued callers on shutdown");
            }
        }

        if !already {
            info!(workers = self.handles.len(), "worker pool stopped");
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether [`shutdown`](WorkerPool::shutdown) has been requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Number of workers that may still process requests.
    pub fn live(&self) -> usize {
        self.handles.iter()
            .filter(|h| !h.status.state().is_terminal())
            .count()
    }

    pub fn processed(&self, worker: usize) -> Option<u64> {
        self.handles.get(worker).map(|h| h.status.processed())
    }

    pub fn state(&self, worker: usize) -> Option<WorkerState> {
        self.handles.get(worker).map(|h| h.status.state())
    }

    fn first_dead(&self) -> Option<usize> {
        self.handles.iter()
            .find(|h| h.status.state() == WorkerState::Dead)
            .map(|h| h.id)
    }
}

impl<T> Drop for WorkerPool<T> {
    /// Ensures the worker threads are terminated when the pool is dropped.
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        for handle in &self.handles {
            handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_tensor::MockTensor;
    use crate::communication::{channel, Contribution, ObservableRequest};
    use crate::testing::ScaleEngine;

    async fn run(queue: &DispatchQueue<MockTensor>, value: i64) -> Result<Vec<MockTensor>, DispatchError> {
        let (completion, notification) = channel();
        let contribution = Contribution::new(vec![MockTensor::column(&[value])], 1, completion);
        queue.enqueue(Arc::new(ObservableRequest::single(contribution))).await?;
        notification.await
    }

    #[tokio::test]
    async fn test_workers_replicate_and_serve() {
        let queue = DispatchQueue::bounded(4);
        let pool = WorkerPool::start(Arc::new(ScaleEngine::new(3)), 2, queue.clone(), Duration::ZERO).unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.live(), 2);
        assert!(!pool.is_shutting_down());
        assert_eq!(pool.state(0), Some(WorkerState::Running));
        assert_eq!(run(&queue, 5).await.unwrap(), vec![MockTensor::column(&[15])]);
        assert_eq!(pool.processed(0).unwrap() + pool.processed(1).unwrap(), 1);
        assert_eq!(pool.state(2), None);
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_workers() {
        let queue = DispatchQueue::bounded(4);
        let pool = WorkerPool::start(Arc::new(ScaleEngine::new(1)), 3, queue.clone(), Duration::ZERO).unwrap();

        pool.shutdown();
        assert!(pool.is_shutting_down());
        assert_eq!(pool.live(), 0);
        for worker in 0..3 {
            assert_eq!(pool.state(worker), Some(WorkerState::Stopped));
        }
        assert_eq!(run(&queue, 1).await, Err(DispatchError::ShutDown));

        // idempotent
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_replication_failure_fails_start() {
        let queue = DispatchQueue::<MockTensor>::bounded(4);
        let engine = ScaleEngine::new(1).failing_replication("device lost");

        let err = WorkerPool::start(Arc::new(engine), 2, queue.clone(), Duration::ZERO).err().unwrap();
        assert!(matches!(
            err,
            DispatchError::Replication { source: EngineError::Initialization(_), .. }
        ));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_panicking_worker_is_dead_and_pool_drains() {
        let queue = DispatchQueue::bounded(4);
        let pool = WorkerPool::start(
            Arc::new(ScaleEngine::new(2).panicking_on(-1)),
            1,
            queue.clone(),
            Duration::ZERO,
        ).unwrap();

        assert_eq!(run(&queue, -1).await, Err(DispatchError::Abandoned));

        // the only worker is gone: new work is refused rather than left hanging
        assert_eq!(run(&queue, 4).await, Err(DispatchError::NoWorkers));

        pool.shutdown();
        assert_eq!(pool.state(0), Some(WorkerState::Dead));
    }
}
