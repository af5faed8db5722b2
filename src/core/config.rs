use crate::core::errors::{Result, SourceError};
use serde::{Deserialize, Serialize};

/// Configuration for the asynchronous executor's worker pool.
///
/// Timeouts are not configured here; they are supplied per consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of threads running producers and transforms
    pub workers: usize,
    /// Threads driving timers and completion bookkeeping
    pub timer_threads: usize,
    /// Name given to pool threads
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);

        Self {
            workers: parallelism.max(2),
            timer_threads: 1,
            thread_name: "dagger-source-worker".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Parse a configuration from YAML; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| SourceError::configuration(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SourceError::configuration("workers must be greater than 0"));
        }
        if self.timer_threads == 0 {
            return Err(SourceError::configuration(
                "timer_threads must be greater than 0",
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(SourceError::configuration("thread_name cannot be empty"));
        }
        Ok(())
    }
}
