pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod models;
pub mod services;
pub mod worker;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::RunnerConfig;
pub use context::{ContextHandle, MainContext};
pub use manager::{Operations, SyncDirection, TaskManager};
pub use models::{
    entry::{EntryDetail, EntrySummary},
    message::{TaskEvent, TaskOutput},
    task::{Task, TaskState},
};
pub use services::{NotificationSink, PasswordService};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
