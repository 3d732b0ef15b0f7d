use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    str::FromStr,
    sync::{Arc, Mutex},
};

use log::{error, info, warn};

use super::task_manager::TaskManager;
use crate::config::RunnerConfig;
use crate::context::ContextHandle;
use crate::error::{OperationError, ServiceError};
use crate::lock;
use crate::models::{
    entry::{EntryDetail, EntrySummary},
    message::TaskOutput,
    task::Task,
};
use crate::services::{NotificationSink, PasswordService};
use crate::worker::{worker::panic_message, WorkerPool};

type ActiveTasks = Arc<Mutex<HashMap<String, Vec<Task>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Pull,
    Push,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Pull => "pull",
            SyncDirection::Push => "push",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(SyncDirection::Pull),
            "push" => Ok(SyncDirection::Push),
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }
}

pub struct Progress {
    task: Task,
    context: ContextHandle,
}

impl Progress {
    pub fn report(&self, fraction: f64, status: impl Into<String>) {
        let task = self.task.clone();
        let status = status.into();
        let queued = self.context.invoke(move || {
            if let Err(e) = task.update_progress(fraction, &status) {
                warn!("Dropped progress update: {}", e);
            }
        });
        if queued.is_err() {
            warn!("Owning context closed; progress for '{}' lost.", self.task.name());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), OperationError> {
        if self.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

struct Delivery<F, C> {
    task: Task,
    active: ActiveTasks,
    failure_context: &'static str,
    fallback: F,
    callback: C,
}

pub struct Operations {
    service: Arc<dyn PasswordService>,
    manager: TaskManager,
    context: ContextHandle,
    pool: WorkerPool,
    active: ActiveTasks,
}

impl Operations {
    pub fn new(
        service: Arc<dyn PasswordService>,
        sink: Arc<dyn NotificationSink>,
        context: ContextHandle,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            service,
            manager: TaskManager::new(sink),
            context,
            pool: WorkerPool::new(config),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn active_operations(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.active).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cancel(&self, name: &str) -> bool {
        match lock(&self.active).get(name) {
            Some(tasks) => {
                tasks.iter().for_each(Task::cancel);
                !tasks.is_empty()
            }
            None => false,
        }
    }

    /// Stops accepting work. In-flight tasks are not waited for.
    pub fn shutdown(&self) {
        let in_flight: usize = lock(&self.active).values().map(Vec::len).sum();
        info!("Shutting down operations ({} in flight).", in_flight);
        self.pool.shutdown();
    }

    pub fn load_entries<C>(&self, callback: C) -> Task
    where
        C: FnOnce(bool, Vec<EntrySummary>) + Send + 'static,
    {
        self.submit(
            "load_passwords",
            "Loading passwords...".to_string(),
            "Failed to load passwords",
            |service, progress| {
                if !service.is_initialized() {
                    return Err(OperationError::NotInitialized);
                }
                progress.report(0.1, "Reading password store...");
                let entries = service.get_all_entries()?;
                progress.report(0.8, format!("Found {} entries", entries.len()));
                Ok(entries)
            },
            |_| Vec::new(),
            callback,
        )
    }

    pub fn search_entries<C>(&self, query: &str, callback: C) -> Task
    where
        C: FnOnce(bool, Vec<EntrySummary>) + Send + 'static,
    {
        let query = query.to_string();
        self.submit(
            "search_passwords",
            format!("Searching for '{}'...", query),
            "Failed to search passwords",
            move |service, progress| {
                progress.report(0.1, "Searching...");
                let entries = service.search_entries(&query)?;
                progress.report(0.8, format!("{} match(es)", entries.len()));
                Ok(entries)
            },
            |_| Vec::new(),
            callback,
        )
    }

    pub fn get_entry_details<C>(&self, path: &str, callback: C) -> Task
    where
        C: FnOnce(bool, EntryDetail) + Send + 'static,
    {
        let path = path.to_string();
        self.submit(
            "get_entry_details",
            format!("Opening {}...", path),
            "Failed to get entry details",
            move |service, progress| {
                if path.trim().is_empty() {
                    return Err(OperationError::MissingPath);
                }
                progress.report(0.2, "Decrypting...");
                let detail = service.get_entry_details(&path)?;
                progress.report(0.8, "Decrypted");
                Ok(detail)
            },
            |_| EntryDetail::default(),
            callback,
        )
    }

    pub fn save_entry<C>(&self, path: &str, content: &str, is_new: bool, callback: C) -> Task
    where
        C: FnOnce(bool, String) + Send + 'static,
    {
        let path = path.to_string();
        let content = content.to_string();
        self.submit(
            "save_entry",
            format!("Saving {}...", path),
            "Failed to save entry",
            move |service, progress| {
                if path.trim().is_empty() {
                    return Err(OperationError::MissingPath);
                }
                if content.is_empty() {
                    return Err(OperationError::MissingContent);
                }
                progress.report(0.3, "Encrypting...");
                let message = if is_new {
                    service.create_entry(&path, &content)?
                } else {
                    service.update_entry(&path, &content)?
                };
                progress.report(0.9, "Saved");
                Ok(message)
            },
            str::to_string,
            callback,
        )
    }

    pub fn git_sync<C>(&self, direction: SyncDirection, callback: C) -> Task
    where
        C: FnOnce(bool, String) + Send + 'static,
    {
        let (name, description, failure_context) = match direction {
            SyncDirection::Pull => ("git_pull", "Pulling changes...", "Failed to run git pull"),
            SyncDirection::Push => ("git_push", "Pushing changes...", "Failed to run git push"),
        };
        self.submit(
            name,
            description.to_string(),
            failure_context,
            move |service, progress| {
                progress.report(0.1, format!("Running git {}...", direction));
                let message = match direction {
                    SyncDirection::Pull => service.sync_pull()?,
                    SyncDirection::Push => service.sync_push()?,
                };
                progress.report(0.9, "Synchronized");
                Ok(message)
            },
            str::to_string,
            callback,
        )
    }

    /// Like [`Operations::git_sync`], taking the direction by name.
    ///
    /// An unknown name fails the task without reaching the pool.
    pub fn git_sync_named<C>(&self, operation: &str, callback: C) -> Task
    where
        C: FnOnce(bool, String) + Send + 'static,
    {
        match operation.parse::<SyncDirection>() {
            Ok(direction) => self.git_sync(direction, callback),
            Err(e) => {
                let task = self.register("git_sync", format!("Running git {}...", operation));
                let delivery = Delivery {
                    task: task.clone(),
                    active: Arc::clone(&self.active),
                    failure_context: "Failed to run git operation",
                    fallback: str::to_string,
                    callback,
                };
                send(&self.context, delivery, Err::<String, _>(e));
                task
            }
        }
    }

    fn register(&self, name: &str, description: String) -> Task {
        let task = Task::new(name, description);
        self.manager.add_task(&task);
        lock(&self.active).entry(name.to_string()).or_default().push(task.clone());
        if let Err(e) = task.start() {
            error!("Could not start task: {}", e);
        }
        task
    }

    fn submit<T, W, F, C>(
        &self,
        name: &'static str,
        description: String,
        failure_context: &'static str,
        work: W,
        fallback: F,
        callback: C,
    ) -> Task
    where
        T: Clone + Into<TaskOutput> + Send + 'static,
        W: FnOnce(&dyn PasswordService, &Progress) -> Result<T, OperationError> + Send + 'static,
        F: FnOnce(&str) -> T + Send + 'static,
        C: FnOnce(bool, T) + Send + 'static,
    {
        let task = self.register(name, description);
        let slot = Arc::new(Mutex::new(Some(Delivery {
            task: task.clone(),
            active: Arc::clone(&self.active),
            failure_context,
            fallback,
            callback,
        })));

        let progress = Progress {
            task: task.clone(),
            context: self.context.clone(),
        };
        let service = Arc::clone(&self.service);
        let worker_slot = Arc::clone(&slot);
        let job = move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<T, OperationError> {
                progress.check_cancelled()?;
                let value = work(service.as_ref(), &progress)?;
                progress.check_cancelled()?;
                Ok(value)
            }))
            .unwrap_or_else(|payload| Err(OperationError::Panicked(panic_message(&*payload))));

            let delivery = lock(&worker_slot).take();
            if let Some(delivery) = delivery {
                send(&progress.context, delivery, outcome);
            }
        };

        if let Err(e) = self.pool.execute(job) {
            warn!("Could not submit '{}': {}", name, e);
            let delivery = lock(&slot).take();
            if let Some(delivery) = delivery {
                send(&self.context, delivery, Err(e.into()));
            }
        }
        task
    }
}

fn send<T, F, C>(context: &ContextHandle, delivery: Delivery<F, C>, outcome: Result<T, OperationError>)
where
    T: Clone + Into<TaskOutput> + Send + 'static,
    F: FnOnce(&str) -> T + Send + 'static,
    C: FnOnce(bool, T) + Send + 'static,
{
    let name = delivery.task.name().to_string();
    if context.invoke(move || finish(delivery, outcome)).is_err() {
        error!("Owning context closed; result of '{}' dropped.", name);
    }
}

fn finish<T, F, C>(delivery: Delivery<F, C>, outcome: Result<T, OperationError>)
where
    T: Clone + Into<TaskOutput>,
    F: FnOnce(&str) -> T,
    C: FnOnce(bool, T),
{
    let Delivery {
        task,
        active,
        failure_context,
        fallback,
        callback,
    } = delivery;

    {
        let mut active = lock(&active);
        if let Some(tasks) = active.get_mut(task.name()) {
            tasks.retain(|current| !current.same(&task));
            if tasks.is_empty() {
                active.remove(task.name());
            }
        }
    }

    match outcome {
        Ok(value) => {
            // Already-finished tasks only log; the callback still runs once.
            let _ = task.update_progress(1.0, "Done");
            let _ = task.complete(true, Some(value.clone().into()));
            callback(true, value);
        }
        Err(e) => {
            let message = failure_message(failure_context, &e);
            let _ = task.fail(&message);
            callback(false, fallback(&message));
        }
    }
}

fn failure_message(context: &str, error: &OperationError) -> String {
    match error {
        OperationError::Service(ServiceError::Failed(_)) | OperationError::Panicked(_) => {
            format!("{}: {}", context, error)
        }
        _ => error.to_string(),
    }
}
