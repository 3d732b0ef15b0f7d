pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
