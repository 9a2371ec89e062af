//! # Compute Engines
//!
//! The dispatcher never performs model math itself. It hands tensors to a
//! [`ComputeEngine`], an opaque collaborator that can be replicated once per
//! worker and initialized from a parameter snapshot of the prototype.
//!
//! * [`ComputeEngine`] - the capability every model type implements
//! * [`ReplicationBarrier`] - the pool-wide lock under which replicas copy
//!   the prototype's parameters

mod core_trait;
mod replication;

pub use core_trait::ComputeEngine;
pub use replication::ReplicationBarrier;
