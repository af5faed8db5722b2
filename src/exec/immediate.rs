use super::{Executor, ExecutorKind, Job};
use std::time::Duration;
use tracing::trace;

/// Runs every unit of work inline on the calling thread.
///
/// Work has always finished by the time `dispatch` returns, so there is
/// nothing for a timer to race against; armed timers are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl ImmediateExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ImmediateExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Immediate
    }

    fn dispatch(&self, job: Job) {
        job();
    }

    fn schedule(&self, delay: Duration, _job: Job) {
        trace!(?delay, "Immediate executor drops timer");
    }
}
