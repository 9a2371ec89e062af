use std::sync::{Mutex, PoisonError};
use tracing::debug;
use crate::backend::Backend;
use crate::error::EngineError;
use super::ComputeEngine;

/// Serializes parameter replication across all workers of a pool.
///
/// Building a replica happens concurrently, but reading the prototype's
/// parameter snapshot and loading it into the replica happens under one
/// pool-wide lock, and is always preceded by
/// [`ComputeEngine::synchronize`] on the prototype so that no replica observes
/// a partially written parameter tensor.
#[derive(Debug, Default)]
pub struct ReplicationBarrier {
    lock: Mutex<()>,
}

impl ReplicationBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces a replica of `prototype` carrying the prototype's parameters.
    pub fn replicate<T, E>(&self, prototype: &E) -> Result<E, EngineError>
    where T: Backend, E: ComputeEngine<T>
    {
        let mut replica = prototype.replicate()?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        prototype.synchronize()?;
        let snapshot = prototype.parameters();
        replica.load_parameters(snapshot)?;
        debug!("replica initialized from prototype parameters");

        Ok(replica)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::backend::mock_tensor::MockTensor;

    // Writes to `weight` are staged in `pending` until `synchronize` runs,
    // mimicking an asynchronous execution queue on the prototype's device.
    struct StagedEngine {
        weight: Mutex<i64>,
        pending: Mutex<Option<i64>>,
        loading: Arc<AtomicUsize>,
        max_concurrent_loads: Arc<AtomicUsize>,
    }

    impl StagedEngine {
        fn new(weight: i64) -> Self {
            Self {
                weight: Mutex::new(weight),
                pending: Mutex::new(None),
                loading: Arc::new(AtomicUsize::new(0)),
                max_concurrent_loads: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn weight(&self) -> i64 {
            *self.weight.lock().unwrap()
        }
    }

    #[async_trait]
    impl ComputeEngine<MockTensor> for StagedEngine {
        type Parameters = i64;

        fn replicate(&self) -> Result<Self, EngineError> {
            Ok(Self {
                weight: Mutex::new(0),
                pending: Mutex::new(None),
                loading: self.loading.clone(),
                max_concurrent_loads: self.max_concurrent_loads.clone(),
            })
        }

        fn parameters(&self) -> i64 {
            self.weight()
        }

        fn load_parameters(&mut self, parameters: i64) -> Result<(), EngineError> {
            let now = self.loading.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_loads.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            *self.weight.lock().unwrap() = parameters;
            self.loading.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn synchronize(&self) -> Result<(), EngineError> {
            if let Some(staged) = self.pending.lock().unwrap().take() {
                *self.weight.lock().unwrap() = staged;
            }
            Ok(())
        }

        async fn forward(&self, inputs: Vec<MockTensor>) -> Result<Vec<MockTensor>, EngineError> {
            Ok(inputs)
        }
    }

    #[derive(Debug)]
    struct BrokenEngine;

    #[async_trait]
    impl ComputeEngine<MockTensor> for BrokenEngine {
        type Parameters = ();

        fn replicate(&self) -> Result<Self, EngineError> {
            Err(EngineError::Initialization("no device".into()))
        }

        fn parameters(&self) -> Self::Parameters {}

        fn load_parameters(&mut self, _: ()) -> Result<(), EngineError> {
            Ok(())
        }

        async fn forward(&self, inputs: Vec<MockTensor>) -> Result<Vec<MockTensor>, EngineError> {
            Ok(inputs)
        }
    }

    #[test]
    fn test_flushes_prototype_before_snapshot() {
        let prototype = StagedEngine::new(1);
        *prototype.pending.lock().unwrap() = Some(42);

        let replica = ReplicationBarrier::new().replicate(&prototype).unwrap();
        assert_eq!(replica.weight(), 42);
    }

    #[test]
    fn test_loads_are_serialized() {
        let prototype = Arc::new(StagedEngine::new(7));
        let barrier = Arc::new(ReplicationBarrier::new());

        let handles = (0..4).map(|_| {
            let prototype = prototype.clone();
            let barrier = barrier.clone();
            thread::spawn(move || barrier.replicate(prototype.as_ref()).unwrap().weight())
        }).collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(prototype.max_concurrent_loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initialization_failure_propagates() {
        let err = ReplicationBarrier::new().replicate(&BrokenEngine).unwrap_err();
        assert_eq!(err, EngineError::Initialization("no device".into()));
    }
}
