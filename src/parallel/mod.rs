pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, sweep_seeds, SweepSummary};
pub use pool::WorkerPool;
