use crate::core::errors::{Result, SourceError, Stage};
use crate::core::guard;

/// Anything that can flow through a source graph. Values are cloned when a
/// pending result has more than one observer.
pub trait Value: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Value for T {}

/// The terminal observation of a source: a produced value or a captured
/// failure. Right-biased: `map` and friends only touch the success side.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(SourceError),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub fn failure(cause: SourceError) -> Self {
        Self::Failure(cause)
    }

    /// Invoke exactly one of the two branches, on the calling thread
    pub fn fold<R>(
        self,
        on_failure: impl FnOnce(SourceError) -> R,
        on_success: impl FnOnce(T) -> R,
    ) -> R {
        match self {
            Self::Success(value) => on_success(value),
            Self::Failure(cause) => on_failure(cause),
        }
    }

    /// Apply `f` to a success. A panic inside `f` becomes a failure; a
    /// failure is passed through and `f` is never called.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => guard::capture(Stage::Transform, move || Ok(f(value))),
            Self::Failure(cause) => Outcome::Failure(cause),
        }
    }

    /// Like [`Outcome::map`] for functions that report errors
    pub fn try_map<U>(self, f: impl FnOnce(T) -> anyhow::Result<U>) -> Outcome<U> {
        match self {
            Self::Success(value) => guard::capture(Stage::Transform, move || f(value)),
            Self::Failure(cause) => Outcome::Failure(cause),
        }
    }

    /// Pair two outcomes. When both failed, the cause of `self` wins.
    pub fn zip<U>(self, other: Outcome<U>) -> Outcome<(T, U)> {
        match (self, other) {
            (Self::Success(a), Outcome::Success(b)) => Outcome::Success((a, b)),
            (Self::Failure(cause), _) | (_, Outcome::Failure(cause)) => Outcome::Failure(cause),
        }
    }

    /// Hand a success to `consumer`, or give the captured cause back to the
    /// caller as an error.
    pub fn consume_or_raise(self, consumer: impl FnOnce(T)) -> Result<()> {
        match self {
            Self::Success(value) => {
                consumer(value);
                Ok(())
            }
            Self::Failure(cause) => Err(cause),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(cause) => Err(cause),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn cause(&self) -> Option<&SourceError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(cause) => Self::Failure(cause),
        }
    }
}
