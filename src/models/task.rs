use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use log::{debug, info, warn};

use super::message::{TaskEvent, TaskOutput};
use crate::error::TaskError;
use crate::lock;

pub type Subscriber = Box<dyn FnMut(&Task, &TaskEvent) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Running,
    Completed {
        success: bool,
        result: Option<TaskOutput>,
    },
    Failed(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed { .. } | TaskState::Failed(_))
    }
}

struct Status {
    state: TaskState,
    progress: f64,
    message: String,
}

#[derive(Default)]
struct Dispatch {
    subscribers: Vec<Subscriber>,
    queue: VecDeque<TaskEvent>,
    dispatching: bool,
}

struct Inner {
    name: String,
    description: String,
    cancelled: AtomicBool,
    status: Mutex<Status>,
    dispatch: Mutex<Dispatch>,
}

/// Shared handle to a unit of background work.
///
/// Subscribers run synchronously on whichever thread performs the
/// transition. Events raised from inside a subscriber are queued and
/// delivered to every subscriber after the current one, in order.
#[derive(Clone)]
pub struct Task {
    inner: Arc<Inner>,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                description: description.into(),
                cancelled: AtomicBool::new(false),
                status: Mutex::new(Status {
                    state: TaskState::Pending,
                    progress: 0.0,
                    message: String::new(),
                }),
                dispatch: Mutex::new(Dispatch::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner.status).state.clone()
    }

    pub fn progress(&self) -> f64 {
        lock(&self.inner.status).progress
    }

    pub fn status_text(&self) -> String {
        lock(&self.inner.status).message.clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.status).state == TaskState::Running
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.inner.status).state.is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> Option<TaskOutput> {
        match &lock(&self.inner.status).state {
            TaskState::Completed { result, .. } => result.clone(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<String> {
        match &lock(&self.inner.status).state {
            TaskState::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }

    pub fn same(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `false`, dropping `subscriber`, if the task already finished.
    pub fn subscribe<F>(&self, subscriber: F) -> bool
    where
        F: FnMut(&Task, &TaskEvent) + Send + 'static,
    {
        if self.is_finished() {
            warn!("Task '{}' already finished, subscriber dropped.", self.name());
            return false;
        }
        lock(&self.inner.dispatch).subscribers.push(Box::new(subscriber));
        true
    }

    pub fn start(&self) -> Result<(), TaskError> {
        let mut status = lock(&self.inner.status);
        match status.state {
            TaskState::Pending => {
                status.state = TaskState::Running;
                debug!("Task '{}' started.", self.name());
                Ok(())
            }
            TaskState::Running => Ok(()),
            _ => Err(TaskError::AlreadyFinished(self.name().to_string())),
        }
    }

    /// Records progress and notifies subscribers.
    ///
    /// The fraction is clamped to `0.0..=1.0`. A value lower than the last
    /// one reported is a caller bug: it is logged and dropped.
    pub fn update_progress(&self, fraction: f64, status: &str) -> Result<(), TaskError> {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        {
            let mut current = lock(&self.inner.status);
            match current.state {
                TaskState::Running => {}
                TaskState::Pending => return Err(TaskError::NotRunning(self.name().to_string())),
                _ => return Err(TaskError::AlreadyFinished(self.name().to_string())),
            }
            if fraction < current.progress {
                warn!(
                    "Task '{}' progress went backwards ({} -> {}), ignoring.",
                    self.name(),
                    current.progress,
                    fraction
                );
                return Ok(());
            }
            current.progress = fraction;
            current.message = status.to_string();
        }

        self.emit(TaskEvent::Progress {
            fraction,
            status: status.to_string(),
        });
        Ok(())
    }

    pub fn complete(&self, success: bool, result: Option<TaskOutput>) -> Result<(), TaskError> {
        {
            let mut current = lock(&self.inner.status);
            if current.state.is_terminal() {
                warn!("Task '{}' completed twice, ignoring.", self.name());
                return Err(TaskError::AlreadyFinished(self.name().to_string()));
            }
            if success {
                current.progress = 1.0;
            }
            current.state = TaskState::Completed {
                success,
                result: result.clone(),
            };
        }

        info!("Task '{}' completed (success: {}).", self.name(), success);
        self.emit(TaskEvent::Completed { success, result });
        Ok(())
    }

    pub fn fail(&self, error: &str) -> Result<(), TaskError> {
        {
            let mut current = lock(&self.inner.status);
            if current.state.is_terminal() {
                warn!("Task '{}' failed after finishing, ignoring.", self.name());
                return Err(TaskError::AlreadyFinished(self.name().to_string()));
            }
            current.state = TaskState::Failed(error.to_string());
        }

        info!("Task '{}' failed: {}", self.name(), error);
        self.emit(TaskEvent::Failed {
            error: error.to_string(),
        });
        Ok(())
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            info!("Task '{}' cancellation requested.", self.name());
        }
    }

    fn emit(&self, event: TaskEvent) {
        let mut subscribers = {
            let mut dispatch = lock(&self.inner.dispatch);
            dispatch.queue.push_back(event);
            if dispatch.dispatching {
                return;
            }
            dispatch.dispatching = true;
            std::mem::take(&mut dispatch.subscribers)
        };

        // Subscribers run without the lock held so they may read the task,
        // subscribe, or drive another transition.
        loop {
            let event = {
                let mut dispatch = lock(&self.inner.dispatch);
                subscribers.append(&mut dispatch.subscribers);
                match dispatch.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        dispatch.subscribers = subscribers;
                        dispatch.dispatching = false;
                        return;
                    }
                }
            };
            for subscriber in subscribers.iter_mut() {
                subscriber(self, &event);
            }
            // Nothing follows a terminal event.
            if event.is_terminal() {
                subscribers.clear();
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("description", &self.inner.description)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
