use super::nodes::Joined;
use super::{consumption_span, Source};
use crate::core::outcome::{Outcome, Value};
use crate::exec::{self, Deadline, Executor};
use std::sync::Arc;
use std::time::Duration;

/// Two independently consumable branches, usually produced by
/// [`Source::fork`] over one shared upstream.
///
/// Mapping one branch leaves the other untouched; both keep sharing the
/// memoized upstream they were forked from.
pub struct SourcePair<A, B> {
    first: Source<A>,
    second: Source<B>,
}

impl<A, B> Clone for SourcePair<A, B> {
    fn clone(&self) -> Self {
        Self {
            first: self.first.clone(),
            second: self.second.clone(),
        }
    }
}

impl<A: Value, B: Value> SourcePair<A, B> {
    pub fn new(first: Source<A>, second: Source<B>) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &Source<A> {
        &self.first
    }

    pub fn second(&self) -> &Source<B> {
        &self.second
    }

    pub fn into_parts(self) -> (Source<A>, Source<B>) {
        (self.first, self.second)
    }

    pub fn map_first<U: Value>(
        &self,
        f: impl Fn(A) -> U + Send + Sync + 'static,
    ) -> SourcePair<U, B> {
        SourcePair::new(self.first.map(f), self.second.clone())
    }

    pub fn try_map_first<U: Value>(
        &self,
        f: impl Fn(A) -> anyhow::Result<U> + Send + Sync + 'static,
    ) -> SourcePair<U, B> {
        SourcePair::new(self.first.try_map(f), self.second.clone())
    }

    pub fn map_second<U: Value>(
        &self,
        f: impl Fn(B) -> U + Send + Sync + 'static,
    ) -> SourcePair<A, U> {
        SourcePair::new(self.first.clone(), self.second.map(f))
    }

    pub fn try_map_second<U: Value>(
        &self,
        f: impl Fn(B) -> anyhow::Result<U> + Send + Sync + 'static,
    ) -> SourcePair<A, U> {
        SourcePair::new(self.first.clone(), self.second.try_map(f))
    }

    /// Recombine both branches. When both fail, the first branch's failure
    /// is reported.
    pub fn join<T: Value>(&self, f: impl Fn(A, B) -> T + Send + Sync + 'static) -> Source<T> {
        self.try_join(move |a, b| Ok(f(a, b)))
    }

    pub fn try_join<T: Value>(
        &self,
        f: impl Fn(A, B) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Source<T> {
        Source::from_node(Joined {
            first: self.first.clone(),
            second: self.second.clone(),
            f: Arc::new(f),
        })
    }

    /// Run both branches on the calling thread, first then second
    pub fn consume(&self, on_first: impl FnOnce(Outcome<A>), on_second: impl FnOnce(Outcome<B>)) {
        let executor = exec::immediate();
        let _span = consumption_span(&executor, None).entered();
        let first = self.first.start(&executor, None);
        let second = self.second.start(&executor, None);
        on_first(first.wait());
        on_second(second.wait());
    }

    /// Run both branches on `executor`. Each handler fires as soon as its own
    /// branch resolves.
    pub fn async_consume(
        &self,
        executor: &Arc<dyn Executor>,
        on_first: impl FnOnce(Outcome<A>) + Send + 'static,
        on_second: impl FnOnce(Outcome<B>) + Send + 'static,
    ) {
        let _span = consumption_span(executor, None).entered();
        self.first.start(executor, None).on_complete(on_first);
        self.second.start(executor, None).on_complete(on_second);
    }

    /// Like [`SourcePair::async_consume`], with one deadline covering both
    /// branches
    pub fn async_consume_with_timeout(
        &self,
        executor: &Arc<dyn Executor>,
        timeout: Duration,
        on_first: impl FnOnce(Outcome<A>) + Send + 'static,
        on_second: impl FnOnce(Outcome<B>) + Send + 'static,
    ) {
        let _span = consumption_span(executor, Some(timeout)).entered();
        let deadline = Deadline::after(timeout);
        self.first.start(executor, Some(deadline)).on_complete(on_first);
        self.second.start(executor, Some(deadline)).on_complete(on_second);
    }
}
