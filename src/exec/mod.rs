//! Execution strategies.
//!
//! An [`Executor`] only knows how to run a unit of work and how to arm a
//! timer. Everything a source graph needs on top of that (starting a
//! producer, chaining a transform, combining two pending results, bounding a
//! pending result by a deadline) lives in [`ExecutorExt`] and is shared by
//! every strategy.

pub mod immediate;
pub mod pending;
pub mod pooled;

pub use immediate::ImmediateExecutor;
pub use pending::Pending;
pub use pooled::AsyncExecutor;

use crate::core::config::ExecutorConfig;
use crate::core::errors::{Result, SourceError, Stage};
use crate::core::guard;
use crate::core::outcome::{Outcome, Value};
use pending::Completer;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{warn, Span};

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Package `work` to run inside the span that is current right now
fn job_in_current_span(work: impl FnOnce() + Send + 'static) -> Job {
    let span = Span::current();
    Box::new(move || span.in_scope(work))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    Immediate,
    Asynchronous,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Immediate => write!(f, "immediate"),
            ExecutorKind::Asynchronous => write!(f, "asynchronous"),
        }
    }
}

/// The capability set a source graph is evaluated against
pub trait Executor: Send + Sync + 'static {
    fn kind(&self) -> ExecutorKind;

    /// Run `job`, either right here on the caller or on a worker
    fn dispatch(&self, job: Job);

    /// Run `job` once `delay` has elapsed
    fn schedule(&self, delay: Duration, job: Job);
}

/// Build the immediate strategy
pub fn immediate() -> Arc<dyn Executor> {
    Arc::new(ImmediateExecutor::new())
}

/// Build the asynchronous strategy with its own worker pool
pub fn asynchronous(config: ExecutorConfig) -> Result<Arc<dyn Executor>> {
    Ok(Arc::new(AsyncExecutor::new(config)?))
}

/// A point in time by which a pending result must resolve
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            timeout,
        }
    }

    /// The duration originally requested
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left, or `None` if the deadline lies beyond what `Instant` can hold
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// The operations sources are evaluated with, available on any shared executor
pub trait ExecutorExt {
    /// Start `producer`, returning the handle its outcome will land in
    fn run_now<T: Value>(
        &self,
        producer: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T>;

    /// Start `producer`; if it has not finished within `timeout`, the handle
    /// resolves with a timeout failure instead
    fn run_now_with_timeout<T: Value>(
        &self,
        producer: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
        timeout: Duration,
    ) -> Pending<T>;

    /// Arm a timer that fails `pending` with a timeout once `deadline` passes
    fn expire_at<T: Value>(&self, pending: &Pending<T>, deadline: Deadline);

    /// Run `f` on the success of `pending`; failures pass straight through
    fn transform<S: Value, T: Value>(
        &self,
        pending: &Pending<S>,
        f: impl FnOnce(S) -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T>;

    /// Run `f` once both `first` and `second` succeed. If either failed the
    /// result carries that failure; if both failed, `first`'s failure wins.
    fn combine<A: Value, B: Value, T: Value>(
        &self,
        first: &Pending<A>,
        second: &Pending<B>,
        f: impl FnOnce(A, B) -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T>;
}

impl<E: Executor + ?Sized> ExecutorExt for Arc<E> {
    fn run_now<T: Value>(
        &self,
        producer: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T> {
        let pending = Pending::new();
        let completer = Completer::new(pending.clone());
        self.dispatch(job_in_current_span(move || {
            completer.complete(guard::capture(Stage::Produce, producer));
        }));
        pending
    }

    fn run_now_with_timeout<T: Value>(
        &self,
        producer: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
        timeout: Duration,
    ) -> Pending<T> {
        let deadline = Deadline::after(timeout);
        let pending = self.run_now(producer);
        self.expire_at(&pending, deadline);
        pending
    }

    fn expire_at<T: Value>(&self, pending: &Pending<T>, deadline: Deadline) {
        if pending.is_resolved() {
            return;
        }
        let Some(delay) = deadline.remaining() else {
            return;
        };

        // The timer must not keep a resolved outcome alive until the deadline
        let pending = pending.downgrade();
        self.schedule(
            delay,
            job_in_current_span(move || {
                let Some(pending) = pending.upgrade() else {
                    return;
                };
                let timeout = deadline.timeout();
                if pending.complete(Outcome::Failure(SourceError::timed_out(timeout))) {
                    warn!(
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "Pending result timed out"
                    );
                }
            }),
        );
    }

    fn transform<S: Value, T: Value>(
        &self,
        pending: &Pending<S>,
        f: impl FnOnce(S) -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T> {
        let next = Pending::new();
        let completer = Completer::new(next.clone());
        let executor = Arc::clone(self);
        let span = Span::current();

        pending.on_complete(move |outcome| match outcome {
            Outcome::Success(value) => executor.dispatch(Box::new(move || {
                span.in_scope(|| {
                    completer.complete(guard::capture(Stage::Transform, move || f(value)));
                })
            })),
            Outcome::Failure(cause) => {
                completer.complete(Outcome::Failure(cause));
            }
        });
        next
    }

    fn combine<A: Value, B: Value, T: Value>(
        &self,
        first: &Pending<A>,
        second: &Pending<B>,
        f: impl FnOnce(A, B) -> anyhow::Result<T> + Send + 'static,
    ) -> Pending<T> {
        let next = Pending::new();
        let state = Arc::new(Mutex::new(Rendezvous {
            first: None,
            second: None,
            finish: Some((Completer::new(next.clone()), f, Span::current())),
        }));

        let (executor, shared) = (Arc::clone(self), Arc::clone(&state));
        first.on_complete(move |outcome| {
            let ready = {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                state.first = Some(outcome);
                state.take_ready()
            };
            if let Some(ready) = ready {
                finish_combine(&executor, ready);
            }
        });

        let executor = Arc::clone(self);
        second.on_complete(move |outcome| {
            let ready = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.second = Some(outcome);
                state.take_ready()
            };
            if let Some(ready) = ready {
                finish_combine(&executor, ready);
            }
        });

        next
    }
}

/// Collects both sides of a combine; whichever side arrives last finishes it
struct Rendezvous<A, B, T: Value, F> {
    first: Option<Outcome<A>>,
    second: Option<Outcome<B>>,
    finish: Option<(Completer<T>, F, Span)>,
}

type Ready<A, B, T, F> = (Outcome<A>, Outcome<B>, Completer<T>, F, Span);

impl<A, B, T: Value, F> Rendezvous<A, B, T, F> {
    fn take_ready(&mut self) -> Option<Ready<A, B, T, F>> {
        if self.first.is_none() || self.second.is_none() {
            return None;
        }
        let (completer, f, span) = self.finish.take()?;
        Some((self.first.take()?, self.second.take()?, completer, f, span))
    }
}

fn finish_combine<E, A, B, T, F>(
    executor: &Arc<E>,
    (first, second, completer, f, span): Ready<A, B, T, F>,
)
where
    E: Executor + ?Sized,
    A: Value,
    B: Value,
    T: Value,
    F: FnOnce(A, B) -> anyhow::Result<T> + Send + 'static,
{
    match first.zip(second) {
        Outcome::Success((a, b)) => executor.dispatch(Box::new(move || {
            span.in_scope(|| {
                completer.complete(guard::capture(Stage::Join, move || f(a, b)));
            })
        })),
        Outcome::Failure(cause) => {
            completer.complete(Outcome::Failure(cause));
        }
    }
}
