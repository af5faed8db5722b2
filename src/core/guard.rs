//! Converts anything user code does wrong into a failed [`Outcome`].
//!
//! Every place that calls a caller-supplied closure (leaf producers, map
//! functions, join bifunctions) goes through [`capture`], so neither an
//! `Err` nor a panic can escape onto a worker thread or skip the write to a
//! pending result.

use crate::core::errors::{SourceError, Stage};
use crate::core::outcome::Outcome;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// Run `f`, turning `Err` and panics into a failure tagged with `stage`
pub fn capture<T>(stage: Stage, f: impl FnOnce() -> anyhow::Result<T>) -> Outcome<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(error)) => {
            debug!(%stage, error = %error, "Captured failure");
            Outcome::Failure(SourceError::failed(stage, error))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!(%stage, %message, "Captured panic");
            Outcome::Failure(SourceError::panicked(stage, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
