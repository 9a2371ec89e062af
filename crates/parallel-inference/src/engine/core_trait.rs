use async_trait::async_trait;
use crate::backend::Backend;
use crate::error::EngineError;

/// Defines a replicable model that maps a set of input tensors to a set of
/// output tensors.
///
/// One prototype is handed to the dispatcher; each worker builds its own
/// replica through [`replicate`](ComputeEngine::replicate), loads the
/// prototype's parameters into it, and from then on owns it exclusively.
///
/// # Type Parameters
///
/// * `T` - The tensor type that implements [`Backend`]
///
/// # Implementation Notes
///
/// Implementations should:
/// * Treat dimension 0 of every input as the batch dimension, and return
///   outputs whose dimension 0 matches it when batched dispatch is used
/// * Be deterministic for a given parameter snapshot
///
/// Single-input networks and multi-input graphs are both plain implementors:
/// the former simply read `inputs[0]` and return a one-element vector.
///
/// # Example
///
/// ```ignore
/// use parallel_inference::engine::ComputeEngine;
/// use parallel_inference::error::EngineError;
/// use async_trait::async_trait;
///
/// #[derive(Clone)]
/// struct Scale {
///     factor: f64,
/// }
///
/// #[async_trait]
/// impl ComputeEngine<Tensor> for Scale {
///     type Parameters = f64;
///
///     fn replicate(&self) -> Result<Self, EngineError> {
///         Ok(Scale { factor: 0.0 })
///     }
///
///     fn parameters(&self) -> f64 {
///         self.factor
///     }
///
///     fn load_parameters(&mut self, factor: f64) -> Result<(), EngineError> {
///         self.factor = factor;
///         Ok(())
///     }
///
///     async fn forward(&self, inputs: Vec<Tensor>) -> Result<Vec<Tensor>, EngineError> {
///         inputs.iter().map(|t| scale(t, self.factor)).collect()
///     }
/// }
/// ```
#[async_trait]
pub trait ComputeEngine<T>: Send + Sync + 'static
where T: Backend
{
    /// Snapshot of the engine's trained parameters.
    type Parameters: Send;

    /// Builds a fresh, initialized engine from this engine's configuration.
    ///
    /// The replica's parameters are not expected to match the prototype yet;
    /// they are copied afterwards through [`load_parameters`](ComputeEngine::load_parameters).
    fn replicate(&self) -> Result<Self, EngineError>
    where Self: Sized;

    /// Returns a snapshot of the current parameters.
    fn parameters(&self) -> Self::Parameters;

    /// Replaces this engine's parameters with `parameters`.
    fn load_parameters(&mut self, parameters: Self::Parameters) -> Result<(), EngineError>;

    /// Blocks until every outstanding asynchronous operation on this engine
    /// has completed, so that a following [`parameters`](ComputeEngine::parameters)
    /// call observes fully written tensors.
    fn synchronize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Number of devices this engine can run on. Used as the default worker count.
    fn device_count(&self) -> usize {
        1
    }

    /// Runs the forward pass.
    ///
    /// # Parameters
    ///
    /// * `inputs` - The input tensors, positionally ordered
    ///
    /// # Returns
    ///
    /// The output tensors, positionally ordered
    async fn forward(&self, inputs: Vec<T>) -> Result<Vec<T>, EngineError>;
}
