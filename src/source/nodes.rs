//! The node kinds a source graph is built from. Each knows how to turn
//! itself into a pending result against a given executor.

use super::Source;
use crate::core::outcome::Value;
use crate::exec::{Deadline, Executor, ExecutorExt, Pending};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub(crate) type Producer<T> = Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>;
pub(crate) type Transform<S, T> = Arc<dyn Fn(S) -> anyhow::Result<T> + Send + Sync>;
pub(crate) type Combiner<A, B, T> = Arc<dyn Fn(A, B) -> anyhow::Result<T> + Send + Sync>;

pub(crate) trait Node<T>: Send + Sync {
    fn execute(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T>;

    fn is_shared(&self) -> bool {
        false
    }
}

fn bounded<T: Value>(
    executor: &Arc<dyn Executor>,
    pending: Pending<T>,
    deadline: Option<Deadline>,
) -> Pending<T> {
    if let Some(deadline) = deadline {
        executor.expire_at(&pending, deadline);
    }
    pending
}

pub(crate) struct Leaf<T> {
    pub(crate) producer: Producer<T>,
}

impl<T: Value> Node<T> for Leaf<T> {
    fn execute(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T> {
        let producer = Arc::clone(&self.producer);
        bounded(executor, executor.run_now(move || producer()), deadline)
    }
}

pub(crate) struct Mapped<S, T> {
    pub(crate) upstream: Source<S>,
    pub(crate) f: Transform<S, T>,
}

impl<S: Value, T: Value> Node<T> for Mapped<S, T> {
    fn execute(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T> {
        let upstream = self.upstream.node.execute(executor, deadline);
        let f = Arc::clone(&self.f);
        bounded(executor, executor.transform(&upstream, move |s| f(s)), deadline)
    }
}

/// Starts its upstream at most once, however many times it is executed.
/// Every caller gets the same pending result.
pub(crate) struct Shared<T> {
    pub(crate) upstream: Source<T>,
    pub(crate) started: Mutex<Option<Pending<T>>>,
}

impl<T: Value> Node<T> for Shared<T> {
    fn execute(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T> {
        // Deciding to start and starting happen under one lock
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        match &*started {
            Some(pending) => {
                debug!(resolved = pending.is_resolved(), "Reusing shared upstream");
                pending.clone()
            }
            None => {
                debug!(executor = %executor.kind(), "Starting shared upstream");
                let pending = self.upstream.node.execute(executor, deadline);
                *started = Some(pending.clone());
                pending
            }
        }
    }

    fn is_shared(&self) -> bool {
        true
    }
}

pub(crate) struct Joined<A, B, T> {
    pub(crate) first: Source<A>,
    pub(crate) second: Source<B>,
    pub(crate) f: Combiner<A, B, T>,
}

impl<A: Value, B: Value, T: Value> Node<T> for Joined<A, B, T> {
    fn execute(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T> {
        let first = self.first.node.execute(executor, deadline);
        let second = self.second.node.execute(executor, deadline);
        let f = Arc::clone(&self.f);
        bounded(
            executor,
            executor.combine(&first, &second, move |a, b| f(a, b)),
            deadline,
        )
    }
}
