use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Where in a source graph a failure was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// A leaf producer
    Produce,
    /// A map function
    Transform,
    /// A join bifunction
    Join,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Produce => write!(f, "produce"),
            Stage::Transform => write!(f, "transform"),
            Stage::Join => write!(f, "join"),
        }
    }
}

/// An error returned by user code, shared between every observer of it
#[derive(Clone)]
pub struct UserError(Arc<anyhow::Error>);

impl UserError {
    pub fn new<E: Into<anyhow::Error>>(error: E) -> Self {
        Self(Arc::new(error.into()))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether two handles refer to the same captured error
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for UserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// The captured cause carried by a failed [`Outcome`](crate::Outcome).
///
/// Cloning is cheap: the underlying error is shared, so every consumer of a
/// shared fan-out observes the very same cause.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// User code returned an error
    #[error("{stage} failed: {source}")]
    Failed {
        stage: Stage,
        #[source]
        source: UserError,
    },

    /// User code panicked
    #[error("{stage} panicked: {message}")]
    Panicked { stage: Stage, message: String },

    /// The execution did not resolve within the requested duration
    #[error("Operation timed out (timeout: {}ms)", .timeout.as_millis())]
    TimedOut { timeout: Duration },

    /// The unit of work was dropped before it ever ran
    #[error("Work was abandoned before it could run")]
    Abandoned,

    /// Invalid executor configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SourceError {
    /// Create a failure captured from an `Err` returned by user code
    pub fn failed<E: Into<anyhow::Error>>(stage: Stage, source: E) -> Self {
        Self::Failed {
            stage,
            source: UserError::new(source),
        }
    }

    /// Create a failure captured from a panic in user code
    pub fn panicked<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::Panicked {
            stage,
            message: message.into(),
        }
    }

    /// Create a timeout-kind cause
    pub fn timed_out(timeout: Duration) -> Self {
        Self::TimedOut { timeout }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// The stage user code was running in, if the failure came from user code
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Failed { stage, .. } | Self::Panicked { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Downcast the error returned by user code to a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Failed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "failed",
            Self::Panicked { .. } => "panicked",
            Self::TimedOut { .. } => "timeout",
            Self::Abandoned => "abandoned",
            Self::Configuration { .. } => "configuration",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SourceError>;
