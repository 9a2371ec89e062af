use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;
use crate::backend::Backend;
use crate::error::DispatchError;
use super::contribution::Contribution;

/// The two shapes an [`ObservableRequest`] can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Exactly one caller; the engine output is returned unmodified.
    Single,
    /// Several callers concatenated along the batch dimension; the engine
    /// output is split back per caller.
    Batched,
}

/// Why a contribution could not join an open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Single,
    Locked,
    Full,
    Incompatible,
}

struct RequestState<T> {
    /// Set once a worker takes the request; nothing may join afterwards
    locked: bool,

    /// Trailing shape of each input position, shared by every contribution
    signature: Vec<Vec<usize>>,

    contributions: Vec<Contribution<T>>,
}

/// # ObservableRequest
///
/// A unit of dispatchable work: the contributions of one or more callers, and
/// the means to release each of them once the work is computed.
///
/// A request is created by the submission path, travels through the dispatch
/// queue as an `Arc`, and is taken by exactly one worker. Taking it through
/// [`lock`](ObservableRequest::lock) both closes it to further merges and
/// moves the contributions out, so each caller is signaled at most once.
pub(crate) struct ObservableRequest<T> {
    id: Uuid,
    kind: RequestKind,
    limit: usize,

    /// Number of callers merged so far; never decreases
    merged: AtomicUsize,

    /// Signaled when `merged` reaches `limit`
    filled: Notify,

    state: Mutex<RequestState<T>>,
}

impl<T> ObservableRequest<T>
where T: Backend
{
    /// Wraps a single caller's inputs.
    pub fn single(contribution: Contribution<T>) -> Self {
        Self::with_first(RequestKind::Single, 1, contribution)
    }

    /// Opens a batch that accepts up to `limit` callers, `contribution` being the first.
    pub fn batched(contribution: Contribution<T>, limit: usize) -> Self {
        Self::with_first(RequestKind::Batched, limit, contribution)
    }

    fn with_first(kind: RequestKind, limit: usize, contribution: Contribution<T>) -> Self {
        let request = Self {
            id: Uuid::new_v4(),
            kind,
            limit,
            merged: AtomicUsize::new(1),
            filled: Notify::new(),
            state: Mutex::new(RequestState {
                locked: false,
                signature: signature(contribution.inputs()),
                contributions: vec![contribution],
            }),
        };
        if request.is_full() {
            request.filled.notify_one();
        }
        request
    }

    fn state(&self) -> MutexGuard<'_, RequestState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a caller to this request.
    ///
    /// # Returns
    ///
    /// The merged-caller count after the append, or the rejection reason
    /// together with the contribution so the caller can place it elsewhere
    pub fn try_merge(
        &self,
        contribution: Contribution<T>,
    ) -> Result<usize, (Rejection, Contribution<T>)> {
        if self.kind == RequestKind::Single {
            return Err((Rejection::Single, contribution));
        }

        let mut state = self.state();
        if state.locked {
            return Err((Rejection::Locked, contribution));
        }
        if self.is_full() {
            return Err((Rejection::Full, contribution));
        }
        if signature(contribution.inputs()) != state.signature {
            return Err((Rejection::Incompatible, contribution));
        }

        state.contributions.push(contribution);
        let merged = self.merged.fetch_add(1, Ordering::SeqCst) + 1;
        if merged >= self.limit {
            self.filled.notify_one();
        }
        Ok(merged)
    }

    /// Locks the request and takes its contributions.
    ///
    /// Only the first call returns anything; later calls get an empty vector.
    pub fn lock(&self) -> Vec<Contribution<T>> {
        let mut state = self.state();
        state.locked = true;
        std::mem::take(&mut state.contributions)
    }

    /// Locks the request and releases every pending caller with `error`.
    ///
    /// # Returns
    ///
    /// The number of callers released
    pub fn fail(&self, error: DispatchError) -> usize {
        let contributions = self.lock();
        let released = contributions.len();
        for contribution in contributions {
            let (_, _, completion) = contribution.into_parts();
            completion.complete(Err(error.clone()));
        }
        released
    }

    /// Waits up to `wait` for a batched request to reach its caller limit.
    pub async fn wait_until_full(&self, wait: Duration) {
        if self.kind == RequestKind::Single || wait.is_zero() || self.is_full() {
            return;
        }
        let _ = tokio::time::timeout(wait, self.filled.notified()).await;
    }

    pub fn is_full(&self) -> bool {
        self.merged() >= self.limit
    }

    pub fn merged(&self) -> usize {
        self.merged.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

fn signature<T: Backend>(inputs: &[T]) -> Vec<Vec<usize>> {
    inputs.iter()
        .map(|tensor| tensor.shape().into_iter().skip(1).collect())
        .collect()
}
