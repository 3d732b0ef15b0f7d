use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};

use log::{debug, info, warn};

use crate::lock;
use crate::models::{
    message::TaskEvent,
    task::{Task, TaskState},
};
use crate::services::NotificationSink;

#[derive(Default)]
struct Registry {
    next_id: u64,
    tasks: HashMap<u64, Task>,
}

#[derive(Clone)]
pub struct TaskManager {
    registry: Arc<Mutex<Registry>>,
    sink: Arc<dyn NotificationSink>,
}

impl TaskManager {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        TaskManager {
            registry: Arc::new(Mutex::new(Registry::default())),
            sink,
        }
    }

    /// A task that has already finished is announced as started and
    /// finished at once, and never enters the registry.
    pub fn add_task(&self, task: &Task) -> u64 {
        let id = {
            let mut registry = lock(&self.registry);
            registry.next_id += 1;
            let id = registry.next_id;
            registry.tasks.insert(id, task.clone());
            id
        };

        let registry = Arc::downgrade(&self.registry);
        let sink = Arc::clone(&self.sink);
        let live = task.subscribe(move |task, event| on_task_event(&registry, sink.as_ref(), id, task, event));
        self.sink.show_info(&format!("Started: {}", task.description()));

        if live {
            info!("Task '{}' registered with id {}.", task.name(), id);
        } else {
            warn!("Task '{}' was already finished when registered.", task.name());
            lock(&self.registry).tasks.remove(&id);
            if let Some(event) = terminal_event(&task.state()) {
                announce(self.sink.as_ref(), task, &event);
            }
        }
        id
    }

    pub fn cancel_all_tasks(&self) {
        let drained: Vec<Task> = lock(&self.registry).tasks.drain().map(|(_, task)| task).collect();
        for task in &drained {
            task.cancel();
        }
        info!("Cancelled {} task(s).", drained.len());
    }

    pub fn get_active_task_count(&self) -> usize {
        lock(&self.registry).tasks.len()
    }

    pub fn active_task_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = lock(&self.registry).tasks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, id: u64) -> bool {
        lock(&self.registry).tasks.contains_key(&id)
    }

    pub fn get_task(&self, id: u64) -> Option<Task> {
        lock(&self.registry).tasks.get(&id).cloned()
    }
}

fn on_task_event(
    registry: &Weak<Mutex<Registry>>,
    sink: &dyn NotificationSink,
    id: u64,
    task: &Task,
    event: &TaskEvent,
) {
    if !event.is_terminal() {
        return;
    }
    let removed = registry
        .upgrade()
        .and_then(|registry| {
            let removed = lock(&registry).tasks.remove(&id);
            removed
        })
        .is_some();
    if !removed {
        debug!("Task {} finished after being dropped from the registry.", id);
        return;
    }
    announce(sink, task, event);
}

fn terminal_event(state: &TaskState) -> Option<TaskEvent> {
    match state {
        TaskState::Completed { success, result } => Some(TaskEvent::Completed {
            success: *success,
            result: result.clone(),
        }),
        TaskState::Failed(error) => Some(TaskEvent::Failed { error: error.clone() }),
        TaskState::Pending | TaskState::Running => None,
    }
}

fn announce(sink: &dyn NotificationSink, task: &Task, event: &TaskEvent) {
    match event {
        TaskEvent::Completed { success: true, .. } => {
            sink.show_success(&format!("Completed: {}", task.description()));
        }
        TaskEvent::Completed { success: false, .. } => {
            sink.show_error(&format!("Failed: {}", task.description()));
        }
        TaskEvent::Failed { error } => {
            sink.show_error(&format!("Failed: {}: {}", task.description(), error));
        }
        TaskEvent::Progress { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::TaskOutput;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(&'static str, String)>>);

    impl NotificationSink for Recorder {
        fn show_info(&self, message: &str) {
            self.0.lock().unwrap().push(("info", message.to_string()));
        }
        fn show_success(&self, message: &str) {
            self.0.lock().unwrap().push(("success", message.to_string()));
        }
        fn show_error(&self, message: &str) {
            self.0.lock().unwrap().push(("error", message.to_string()));
        }
    }

    fn manager() -> (TaskManager, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (TaskManager::new(recorder.clone()), recorder)
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let (manager, _) = manager();
        let a = manager.add_task(&Task::new("a", "A"));
        let b = manager.add_task(&Task::new("b", "B"));
        assert_eq!((a, b), (1, 2));
        assert_eq!(manager.active_task_ids(), vec![1, 2]);
    }

    #[test]
    fn success_removes_and_notifies() {
        let (manager, recorder) = manager();
        let task = Task::new("load_passwords", "Loading passwords...");
        let id = manager.add_task(&task);
        task.start().unwrap();
        task.update_progress(0.5, "half").unwrap();
        assert!(manager.contains(id));

        task.complete(true, Some(TaskOutput::Message("ok".into()))).unwrap();
        assert!(!manager.contains(id));
        assert_eq!(manager.get_active_task_count(), 0);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ("info", "Started: Loading passwords...".to_string()),
                ("success", "Completed: Loading passwords...".to_string()),
            ]
        );
    }

    #[test]
    fn unsuccessful_completion_is_an_error() {
        let (manager, recorder) = manager();
        let task = Task::new("t", "Syncing");
        manager.add_task(&task);
        task.start().unwrap();
        task.complete(false, None).unwrap();
        assert_eq!(manager.get_active_task_count(), 0);
        assert_eq!(recorder.0.lock().unwrap()[1], ("error", "Failed: Syncing".to_string()));
    }

    #[test]
    fn failure_includes_error() {
        let (manager, recorder) = manager();
        let task = Task::new("t", "Saving entry...");
        manager.add_task(&task);
        task.start().unwrap();
        task.fail("disk full").unwrap();
        assert_eq!(
            recorder.0.lock().unwrap()[1],
            ("error", "Failed: Saving entry...: disk full".to_string())
        );
    }

    #[test]
    fn finished_task_is_announced_but_not_tracked() {
        let (manager, recorder) = manager();
        let task = Task::new("t", "Pulling changes...");
        task.start().unwrap();
        task.fail("boom").unwrap();

        let id = manager.add_task(&task);
        assert!(!manager.contains(id));
        assert_eq!(manager.get_active_task_count(), 0);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ("info", "Started: Pulling changes...".to_string()),
                ("error", "Failed: Pulling changes...: boom".to_string()),
            ]
        );
    }

    #[test]
    fn task_failed_by_an_observer_is_removed() {
        let (manager, recorder) = manager();
        let task = Task::new("load_passwords", "Loading passwords...");
        let aborter = task.clone();
        task.subscribe(move |_, event| {
            if matches!(event, TaskEvent::Progress { .. }) {
                let _ = aborter.fail("aborted by observer");
            }
        });
        manager.add_task(&task);
        task.start().unwrap();
        task.update_progress(0.5, "half").unwrap();

        assert_eq!(task.error().as_deref(), Some("aborted by observer"));
        assert_eq!(manager.get_active_task_count(), 0);
        assert_eq!(
            recorder.0.lock().unwrap().last(),
            Some(&("error", "Failed: Loading passwords...: aborted by observer".to_string()))
        );
    }

    #[test]
    fn cancel_all_clears_immediately() {
        let (manager, recorder) = manager();
        let tasks: Vec<Task> = (0..3).map(|i| Task::new(format!("t{}", i), "work")).collect();
        for task in &tasks {
            manager.add_task(task);
            task.start().unwrap();
        }
        assert_eq!(manager.get_active_task_count(), 3);

        manager.cancel_all_tasks();
        assert_eq!(manager.get_active_task_count(), 0);
        assert!(tasks.iter().all(|t| t.is_cancelled() && t.is_running()));

        // A late terminal event is not announced again.
        tasks[0].fail("Operation cancelled").unwrap();
        assert_eq!(recorder.0.lock().unwrap().len(), 3);
    }
}
