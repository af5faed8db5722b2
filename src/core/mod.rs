// Value-level building blocks shared by executors and sources

pub mod config;
pub mod errors;
pub mod guard;
pub mod outcome;

pub use config::ExecutorConfig;
pub use errors::{Result, SourceError, Stage, UserError};
pub use outcome::{Outcome, Value};
