//! Deferred single-value sources.
//!
//! Building a graph (`Source::new`, `map`, `fork`, `join`) never runs
//! anything. Work only starts when the graph is consumed, and the executor
//! that runs it is chosen at that point:
//!
//! ```
//! use dagger_source::Source;
//!
//! let words = Source::new(|| "hello world".to_string())
//!     .fork(|s| s.len(), |s| s.split(' ').next().unwrap_or_default().to_string())
//!     .join(|length, word| format!("{length} {word}"));
//!
//! words.consume(|outcome| assert_eq!(outcome.into_result().unwrap(), "11 hello"));
//! ```

mod nodes;
mod pair;

pub use pair::SourcePair;

use crate::core::outcome::{Outcome, Value};
use crate::exec::{self, Deadline, Executor, Pending};
use nodes::{Leaf, Mapped, Node, Shared};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug_span, Span};

/// A description of a deferred, possibly failing computation of one value
pub struct Source<T> {
    pub(crate) node: Arc<dyn Node<T>>,
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: Value> Source<T> {
    /// A leaf source. A panic inside `producer` is captured as a failure.
    pub fn new(producer: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::try_new(move || Ok(producer()))
    }

    /// A leaf source whose producer reports errors
    pub fn try_new(producer: impl Fn() -> anyhow::Result<T> + Send + Sync + 'static) -> Self {
        Self::from_node(Leaf {
            producer: Arc::new(producer),
        })
    }

    /// A leaf source that always produces a clone of `value`
    pub fn from_value(value: T) -> Self
    where
        T: Sync,
    {
        Self::new(move || value.clone())
    }

    fn from_node(node: impl Node<T> + 'static) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    pub fn map<U: Value>(&self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Source<U> {
        self.try_map(move |value| Ok(f(value)))
    }

    pub fn try_map<U: Value>(
        &self,
        f: impl Fn(T) -> anyhow::Result<U> + Send + Sync + 'static,
    ) -> Source<U> {
        Source::from_node(Mapped {
            upstream: self.clone(),
            f: Arc::new(f),
        })
    }

    /// Memoize this source: however many times the result is executed, this
    /// source runs at most once and every execution observes its outcome.
    pub fn shared(&self) -> Source<T> {
        if self.node.is_shared() {
            return self.clone();
        }
        Self::from_node(Shared {
            upstream: self.clone(),
            started: Mutex::new(None),
        })
    }

    /// Split into two branches over one shared upstream. The upstream runs
    /// at most once no matter how the branches are consumed.
    pub fn fork<U1: Value, U2: Value>(
        &self,
        f1: impl Fn(T) -> U1 + Send + Sync + 'static,
        f2: impl Fn(T) -> U2 + Send + Sync + 'static,
    ) -> SourcePair<U1, U2> {
        let shared = self.shared();
        SourcePair::new(shared.map(f1), shared.map(f2))
    }

    pub fn try_fork<U1: Value, U2: Value>(
        &self,
        f1: impl Fn(T) -> anyhow::Result<U1> + Send + Sync + 'static,
        f2: impl Fn(T) -> anyhow::Result<U2> + Send + Sync + 'static,
    ) -> SourcePair<U1, U2> {
        let shared = self.shared();
        SourcePair::new(shared.try_map(f1), shared.try_map(f2))
    }

    /// Start this source on `executor` and return its pending result
    pub fn execute(&self, executor: &Arc<dyn Executor>) -> Pending<T> {
        self.node.execute(executor, None)
    }

    /// Like [`Source::execute`], but every stage still unresolved after
    /// `timeout` fails with a timeout
    pub fn execute_with_timeout(&self, executor: &Arc<dyn Executor>, timeout: Duration) -> Pending<T> {
        self.node.execute(executor, Some(Deadline::after(timeout)))
    }

    pub(crate) fn start(&self, executor: &Arc<dyn Executor>, deadline: Option<Deadline>) -> Pending<T> {
        self.node.execute(executor, deadline)
    }

    /// Run on the calling thread and hand the outcome to `handler` before
    /// returning
    pub fn consume(&self, handler: impl FnOnce(Outcome<T>)) {
        let executor = exec::immediate();
        let _span = consumption_span(&executor, None).entered();
        handler(self.start(&executor, None).wait());
    }

    /// Run on `executor`; `handler` is called once, on whichever thread
    /// resolves the result
    pub fn async_consume(
        &self,
        executor: &Arc<dyn Executor>,
        handler: impl FnOnce(Outcome<T>) + Send + 'static,
    ) {
        let _span = consumption_span(executor, None).entered();
        self.start(executor, None).on_complete(handler);
    }

    pub fn async_consume_with_timeout(
        &self,
        executor: &Arc<dyn Executor>,
        timeout: Duration,
        handler: impl FnOnce(Outcome<T>) + Send + 'static,
    ) {
        let _span = consumption_span(executor, Some(timeout)).entered();
        self.start(executor, Some(Deadline::after(timeout)))
            .on_complete(handler);
    }
}

pub(crate) fn consumption_span(executor: &Arc<dyn Executor>, timeout: Option<Duration>) -> Span {
    debug_span!(
        "consume",
        execution_id = %cuid2::create_id(),
        executor = %executor.kind(),
        timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
    )
}
