pub mod operations;
pub mod task_manager;

pub use operations::{Operations, Progress, SyncDirection};
pub use task_manager::TaskManager;
