use super::{Executor, ExecutorKind, Job};
use crate::core::config::ExecutorConfig;
use crate::core::errors::{Result, SourceError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{error, info};

/// Dispatches work to a bounded pool of blocking worker threads and races
/// it against timers driven by a separate set of async threads.
///
/// Producers and transforms may block for as long as they like: they run
/// through `spawn_blocking`, so a saturated pool never stops a timeout from
/// firing.
#[derive(Debug)]
pub struct AsyncExecutor {
    runtime: Option<Runtime>,
    handle: Handle,
    config: ExecutorConfig,
}

impl AsyncExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.timer_threads)
            .max_blocking_threads(config.workers)
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()
            .map_err(|e| SourceError::configuration(format!("failed to start worker pool: {e}")))?;

        info!(
            workers = config.workers,
            timer_threads = config.timer_threads,
            "Asynchronous executor started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            config,
        })
    }

    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(ExecutorConfig::with_workers(workers))
    }

    /// Run on a runtime owned by someone else. The runtime must have its
    /// time driver enabled for timeouts to fire.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
            config: ExecutorConfig::default(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

impl Executor for AsyncExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Asynchronous
    }

    fn dispatch(&self, job: Job) {
        // User code is already guarded; anything escaping here is a result handler
        self.handle.spawn_blocking(move || {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("Result handler panicked on worker thread");
            }
        });
    }

    fn schedule(&self, delay: Duration, job: Job) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("Result handler panicked on timer thread");
            }
        });
    }
}

impl Drop for AsyncExecutor {
    fn drop(&mut self) {
        // In-flight work is detached; queued work is dropped and resolves as abandoned
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
