use thiserror::Error;

/// Error taxonomy for the reconcile engine, per the error handling design:
/// transient I/O, fetch failures, step run failures, precondition
/// violations, and invariant violations each get their own variant so
/// callers can decide whether to requeue, block, or treat the error as a
/// programming bug.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("fetch failed for component '{component}': {reason}")]
    Fetch { component: String, reason: String },

    #[error("step '{step}' failed: {reason}")]
    StepRun { step: String, reason: String },

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("dependency unsatisfied: component '{component}' requires '{requires}'")]
    DependencyUnsatisfied { component: String, requires: String },

    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ReconcileError {
    fn from(e: serde_json::Error) -> Self {
        ReconcileError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
