/// # Constants with reserved meanings in the dispatcher

/// In a given tensor shape, the `0th` dimension is reserved for batching
pub const BATCH_DIM: usize = 0;
