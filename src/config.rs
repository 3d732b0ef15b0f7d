use std::env;

use crate::error::ConfigError;

pub const WORKERS_ENV: &str = "PASS_TASKS_WORKERS";
pub const DEFAULT_WORKERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub workers: usize,
    pub thread_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            thread_name: "pass-worker".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(value) = env::var(WORKERS_ENV) {
            config.workers = parse_workers(&value)?;
        }
        Ok(config)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

fn parse_workers(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidWorkers(value.to_string())),
        Ok(workers) => Ok(workers),
    }
}
