//! Module for the inference worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use crate::backend::Backend;
use crate::communication::{Batch, ObservableRequest};
use crate::engine::{ComputeEngine, ReplicationBarrier};
use crate::error::DispatchError;
use super::pill::Pill;
use super::queue::DispatchQueue;

/// Lifecycle of a worker.
///
/// `Created → Replicating → Running → Draining → Stopped`, or `Dead` when the
/// worker failed to replicate the model or panicked while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Replicating,
    Running,
    Draining,
    Stopped,
    Dead,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Replicating,
            2 => WorkerState::Running,
            3 => WorkerState::Draining,
            4 => WorkerState::Stopped,
            _ => WorkerState::Dead,
        }
    }

    /// Whether the worker will never process another request.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Dead)
    }
}

/// State and processed-request counter of one worker, shared with the pool.
#[derive(Debug, Default)]
pub(crate) struct WorkerStatus {
    state: AtomicU8,
    processed: AtomicU64,
}

impl WorkerStatus {
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    fn record_dequeue(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Readiness report sent once per worker during pool startup.
pub(crate) type Readiness = (usize, Result<(), DispatchError>);

/// One replica of the prototype engine, serially processing dequeued requests.
pub(crate) struct Worker<T, E> {
    pub(crate) id: usize,
    pub(crate) prototype: Arc<E>,
    pub(crate) barrier: Arc<ReplicationBarrier>,
    pub(crate) queue: DispatchQueue<T>,
    pub(crate) status: Arc<WorkerStatus>,
    pub(crate) shutdown: watch::Receiver<bool>,

    /// How long a batched request may linger to fill before it is locked
    pub(crate) batch_wait: Duration,
}

impl<T, E> Worker<T, E>
where T: Backend, E: ComputeEngine<T>
{
    /// Starts the worker on its own named thread.
    ///
    /// The thread drives the worker loop on a current-thread tokio runtime,
    /// so engines are free to use tokio facilities inside `forward`.
    pub fn spawn(self, ready: mpsc::Sender<Readiness>, live: Arc<AtomicUsize>) -> Result<JoinHandle<()>, DispatchError> {
        let id = self.id;
        thread::Builder::new()
            .name(format!("inference-worker-{id}"))
            .spawn(move || {
                let _pill = Pill::new(
                    id,
                    self.status.clone(),
                    live,
                    self.queue.clone(),
                    self.shutdown.clone(),
                );

                let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        self.status.set(WorkerState::Dead);
                        let _ = ready.send((id, Err(DispatchError::WorkerSpawn { worker: id, reason: e.to_string() })));
                        return;
                    }
                };
                runtime.block_on(self.run(ready));
            })
            .map_err(|e| DispatchError::WorkerSpawn { worker: id, reason: e.to_string() })
    }

    async fn run(mut self, ready: mpsc::Sender<Readiness>) {
        self.status.set(WorkerState::Replicating);
        let replica = match self.barrier.replicate(self.prototype.as_ref()) {
            Ok(replica) => replica,
            Err(source) => {
                error!(worker = self.id, error = %source, "model replication failed");
                self.status.set(WorkerState::Dead);
                let _ = ready.send((self.id, Err(DispatchError::Replication { worker: self.id, source })));
                return;
            }
        };
        self.status.set(WorkerState::Running);
        let _ = ready.send((self.id, Ok(())));
        drop(ready);

        loop {
            let request = tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop) => break,
                request = self.queue.dequeue() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.status.record_dequeue();
            self.process(&replica, request).await;
        }

        self.status.set(WorkerState::Draining);
        debug!(worker = self.id, processed = self.status.processed(), "worker loop finished");
    }

    async fn process(&mut self, replica: &E, request: Arc<ObservableRequest<T>>) {
        if !self.batch_wait.is_zero() {
            tokio::select! {
                _ = request.wait_until_full(self.batch_wait) => {}
                _ = self.shutdown.wait_for(|stop| *stop) => {}
            }
        }

        let Some((batch, inputs)) = Batch::assemble(request.kind(), request.lock()) else {
            return;
        };
        debug!(
            worker = self.id,
            request = %request.id(),
            callers = batch.callers(),
            rows = batch.total_rows(),
            "running forward pass"
        );

        match replica.forward(inputs).await {
            Ok(outputs) => batch.deliver(outputs),
            Err(source) => {
                warn!(worker = self.id, request = %request.id(), error = %source, "forward pass failed");
                batch.fail(DispatchError::Computation(source));
            }
        }
    }
}
