use std::sync::Mutex;

use crossbeam_channel::{unbounded, Sender};
use log::{error, info, warn};

use super::worker::{spawn_worker_thread, Job};
use crate::config::RunnerConfig;
use crate::error::PoolError;
use crate::lock;

pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(config: &RunnerConfig) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let mut size = 0;
        for index in 0..config.workers.max(1) {
            let name = format!("{}-{}", config.thread_name, index);
            match spawn_worker_thread(name, receiver.clone()) {
                Ok(()) => size += 1,
                Err(e) => error!("Failed to spawn worker thread: {}", e),
            }
        }
        info!("Worker pool started with {} thread(s).", size);
        Self {
            sender: Mutex::new(Some(sender)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = lock(&self.sender);
        let sender = guard.as_ref().ok_or(PoolError::ShutDown)?;
        sender.send(Box::new(job)).map_err(|_| PoolError::ShutDown)
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Stops accepting work. Queued jobs still drain; nothing is joined.
    pub fn shutdown(&self) {
        if lock(&self.sender).take().is_some() {
            info!("Worker pool shutting down.");
        } else {
            warn!("Worker pool already shut down.");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        lock(&self.sender).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn runs_jobs_on_named_threads() {
        let pool = WorkerPool::new(&RunnerConfig::default());
        assert_eq!(pool.size(), 3);

        let (tx, rx) = bounded(1);
        pool.execute(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("pass-worker-"));
    }

    #[test]
    fn survives_a_panicking_job() {
        let pool = WorkerPool::new(&RunnerConfig::default().with_workers(1));
        pool.execute(|| panic!("job blew up")).unwrap();

        let (tx, rx) = bounded(1);
        pool.execute(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
    }

    #[test]
    fn rejects_work_after_shutdown() {
        let pool = WorkerPool::new(&RunnerConfig::default());
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.execute(|| {}), Err(PoolError::ShutDown));
        pool.shutdown();
    }

    #[test]
    fn runs_up_to_size_jobs_at_once() {
        let pool = WorkerPool::new(&RunnerConfig::default());
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();
        for _ in 0..3 {
            let started_tx = started_tx.clone();
            let release_rx = release_rx.clone();
            pool.execute(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            })
            .unwrap();
        }
        for _ in 0..3 {
            started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        drop(release_tx);
    }
}
