use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use parallel_inference::engine::ComputeEngine;
use parallel_inference::error::EngineError;

/// A single linear layer, `inputs[0] @ weight + bias`.
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
}

impl Linear {
    pub fn new(features: usize, classes: usize, device: &Device) -> candle_core::Result<Self> {
        let weight = Tensor::randn(0f32, 1f32, (features, classes), device)?;
        let bias = Tensor::randn(0f32, 1f32, classes, device)?;
        Ok(Self { weight, bias })
    }
}

fn engine_error(stage: fn(String) -> EngineError) -> impl Fn(candle_core::Error) -> EngineError {
    move |e| stage(e.to_string())
}

#[async_trait]
impl ComputeEngine<Tensor> for Linear {
    type Parameters = (Tensor, Tensor);

    fn replicate(&self) -> Result<Self, EngineError> {
        let zeros = |t: &Tensor| Tensor::zeros(t.dims(), DType::F32, t.device());
        Ok(Self {
            weight: zeros(&self.weight).map_err(engine_error(EngineError::Initialization))?,
            bias: zeros(&self.bias).map_err(engine_error(EngineError::Initialization))?,
        })
    }

    fn parameters(&self) -> Self::Parameters {
        (self.weight.clone(), self.bias.clone())
    }

    fn load_parameters(&mut self, (weight, bias): Self::Parameters) -> Result<(), EngineError> {
        // deep copy, so replicas never share storage with the prototype
        self.weight = weight.copy().map_err(engine_error(EngineError::Parameters))?;
        self.bias = bias.copy().map_err(engine_error(EngineError::Parameters))?;
        Ok(())
    }

    fn synchronize(&self) -> Result<(), EngineError> {
        self.weight.device().synchronize().map_err(engine_error(EngineError::Synchronization))
    }

    async fn forward(&self, inputs: Vec<Tensor>) -> Result<Vec<Tensor>, EngineError> {
        let input = inputs.first()
            .ok_or_else(|| EngineError::Forward("expected one input".to_string()))?;
        let logits = input.matmul(&self.weight)
            .and_then(|t| t.broadcast_add(&self.bias))
            .map_err(engine_error(EngineError::Forward))?;
        Ok(vec![logits])
    }
}
