//! Deferred, fallible single-value sources.
//!
//! A [`Source`] describes how to compute one value; nothing runs until it is
//! consumed. Consumption picks the execution strategy late: the same graph
//! can run inline on the caller ([`ImmediateExecutor`]) or on a worker pool
//! raced against a timeout ([`AsyncExecutor`]). Every result, including a
//! panic or a timeout, arrives as an [`Outcome`].

// Value-level building blocks
pub mod core;

// Execution strategies and the pending result cell
pub mod exec;

// The combinator graph and its consumption protocol
pub mod source;

pub use crate::core::errors::{Result, SourceError, Stage, UserError};
pub use crate::core::{ExecutorConfig, Outcome, Value};
pub use exec::{
    AsyncExecutor, Deadline, Executor, ExecutorExt, ExecutorKind, ImmediateExecutor, Job, Pending,
};
pub use source::{Source, SourcePair};
