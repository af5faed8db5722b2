use crate::core::errors::SourceError;
use crate::core::outcome::{Outcome, Value};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{trace, warn, Span};

type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

enum State<T> {
    Waiting(Vec<Callback<T>>),
    Resolved(Outcome<T>),
}

struct Inner<T> {
    resolved: AtomicBool,
    state: Mutex<State<T>>,
}

/// A single-assignment cell that eventually holds exactly one [`Outcome`].
///
/// The first call to [`Pending::complete`] wins; every later write is
/// discarded. Callbacks registered with [`Pending::on_complete`] run once,
/// on whichever thread performs the winning write (or immediately, on the
/// registering thread, if the cell is already resolved).
pub struct Pending<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("resolved", &self.inner.resolved.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Value> Default for Pending<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> Pending<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                resolved: AtomicBool::new(false),
                state: Mutex::new(State::Waiting(Vec::new())),
            }),
        }
    }

    /// A handle that is resolved from the start
    pub fn resolved(outcome: Outcome<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolved: AtomicBool::new(true),
                state: Mutex::new(State::Resolved(outcome)),
            }),
        }
    }

    /// Write the outcome. Returns `false`, leaving the cell untouched, if
    /// another writer got there first.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        if self.inner.resolved.load(Ordering::Acquire) {
            trace!("Discarding late completion");
            return false;
        }

        let callbacks = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, State::Resolved(outcome.clone())) {
                State::Waiting(callbacks) => {
                    self.inner.resolved.store(true, Ordering::Release);
                    callbacks
                }
                resolved @ State::Resolved(_) => {
                    *state = resolved;
                    trace!("Discarding late completion");
                    return false;
                }
            }
        };

        for callback in callbacks {
            callback(outcome.clone());
        }
        true
    }

    /// Run `callback` with the outcome once it is known
    pub fn on_complete(&self, callback: impl FnOnce(Outcome<T>) + Send + 'static) {
        let outcome = {
            let mut state = self.lock();
            match &mut *state {
                State::Waiting(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Resolved(outcome) => outcome.clone(),
            }
        };
        callback(outcome);
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.load(Ordering::Acquire)
    }

    /// The outcome, if already resolved
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        match &*self.lock() {
            State::Resolved(outcome) => Some(outcome.clone()),
            State::Waiting(_) => None,
        }
    }

    /// Block the calling thread until resolved
    pub fn wait(&self) -> Outcome<T> {
        let (tx, rx) = mpsc::channel();
        self.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.recv()
            .unwrap_or_else(|_| Outcome::Failure(SourceError::Abandoned))
    }

    /// Block the calling thread until resolved or until `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T>> {
        let (tx, rx) = mpsc::channel();
        self.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.recv_timeout(timeout).ok()
    }

    /// Wait asynchronously for the outcome
    pub async fn outcome(&self) -> Outcome<T> {
        let (tx, rx) = oneshot::channel();
        self.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await
            .unwrap_or_else(|_| Outcome::Failure(SourceError::Abandoned))
    }

    /// Whether two handles share the same cell
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that keeps neither the cell nor its outcome alive
    pub(crate) fn downgrade(&self) -> WeakPending<T> {
        WeakPending {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Callbacks never run under the lock, so a poisoned state is still consistent
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Value> IntoFuture for Pending<T> {
    type Output = Outcome<T>;
    type IntoFuture = BoxFuture<'static, Outcome<T>>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.outcome().await }.boxed()
    }
}

pub(crate) struct WeakPending<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakPending<T> {
    /// `None` once every strong handle is gone
    pub(crate) fn upgrade(&self) -> Option<Pending<T>> {
        self.inner.upgrade().map(|inner| Pending { inner })
    }
}

/// Owns the right to complete a pending result from inside a unit of work.
/// If the work is dropped before it runs, the result resolves as abandoned.
pub(crate) struct Completer<T: Value> {
    pending: Option<Pending<T>>,
    span: Span,
}

impl<T: Value> Completer<T> {
    pub(crate) fn new(pending: Pending<T>) -> Self {
        Self {
            pending: Some(pending),
            span: Span::current(),
        }
    }

    pub(crate) fn complete(mut self, outcome: Outcome<T>) -> bool {
        match self.pending.take() {
            Some(pending) => pending.complete(outcome),
            None => false,
        }
    }
}

impl<T: Value> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _entered = self.span.enter();
            if pending.complete(Outcome::Failure(SourceError::Abandoned)) {
                warn!("Work dropped before running, result abandoned");
            }
        }
    }
}
