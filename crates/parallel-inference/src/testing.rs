//! Mock engines shared by the unit tests.

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use tokio::sync::{Barrier, Semaphore};
use crate::backend::Backend;
use crate::backend::mock_tensor::MockTensor;
use crate::engine::ComputeEngine;
use crate::error::EngineError;

/// Multiplies every element of every input by a loaded factor.
///
/// Replicas start with a factor of zero and only produce correct outputs once
/// the prototype's factor has been loaded into them. The optional hooks let
/// tests hold, fail or crash a forward pass on demand.
#[derive(Clone, Default)]
pub(crate) struct ScaleEngine {
    factor: i64,
    devices: usize,

    /// Every forward pass waits here before computing
    rendezvous: Option<Arc<Barrier>>,

    /// Every forward pass consumes one permit before computing
    gate: Option<Arc<Semaphore>>,

    fail_on: Option<i64>,
    panic_on: Option<i64>,
    replicate_error: Option<String>,

    /// Batch rows seen by each forward pass, across all replicas
    batches: Arc<Mutex<Vec<usize>>>,
}

impl ScaleEngine {
    pub fn new(factor: i64) -> Self {
        Self {
            factor,
            devices: 1,
            ..Self::default()
        }
    }

    pub fn with_devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }

    pub fn meeting_at(mut self, rendezvous: Arc<Barrier>) -> Self {
        self.rendezvous = Some(rendezvous);
        self
    }

    pub fn gated_by(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_on(mut self, value: i64) -> Self {
        self.fail_on = Some(value);
        self
    }

    pub fn panicking_on(mut self, value: i64) -> Self {
        self.panic_on = Some(value);
        self
    }

    pub fn failing_replication(mut self, reason: &str) -> Self {
        self.replicate_error = Some(reason.to_string());
        self
    }

    /// Handle on the batch rows recorded by this engine and all its replicas.
    pub fn batches(&self) -> Arc<Mutex<Vec<usize>>> {
        self.batches.clone()
    }
}

#[async_trait]
impl ComputeEngine<MockTensor> for ScaleEngine {
    type Parameters = i64;

    fn replicate(&self) -> Result<Self, EngineError> {
        if let Some(reason) = &self.replicate_error {
            return Err(EngineError::Initialization(reason.clone()));
        }
        Ok(Self { factor: 0, ..self.clone() })
    }

    fn parameters(&self) -> i64 {
        self.factor
    }

    fn load_parameters(&mut self, factor: i64) -> Result<(), EngineError> {
        self.factor = factor;
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.devices
    }

    async fn forward(&self, inputs: Vec<MockTensor>) -> Result<Vec<MockTensor>, EngineError> {
        if let Some(rendezvous) = &self.rendezvous {
            rendezvous.wait().await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| EngineError::Forward(e.to_string()))?
                .forget();
        }

        let contains = |needle: Option<i64>| {
            needle.is_some_and(|n| inputs.iter().any(|t| t.data.contains(&n)))
        };
        if contains(self.panic_on) {
            panic!("Intentional panic in forward pass");
        }
        if contains(self.fail_on) {
            return Err(EngineError::Forward("poisoned input".to_string()));
        }

        if let Some(first) = inputs.first() {
            let rows = first.shape().first().copied().unwrap_or(0);
            self.batches.lock().unwrap().push(rows);
        }
        Ok(inputs.iter().map(|t| t.map(|v| v * self.factor)).collect())
    }
}
