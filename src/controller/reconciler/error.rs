//! # Reconcile Errors
//!
//! Every failure a pass can hit, and how it is classified.

use crate::constants::{
    REASON_CONFIGURATION_ERROR, REASON_MIGRATION_ERROR, REASON_TRANSIENT_ERROR,
};
use crate::controller::resolver::AccessError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// How the controller reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource itself is wrong. Retrying without a spec change cannot help.
    Configuration,
    /// Expected to clear up on its own; retried with backoff
    Transient,
    /// The executor ran and reported a failed migration
    Migration,
}

impl ErrorClass {
    /// Condition reason recorded for this class
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorClass::Configuration => REASON_CONFIGURATION_ERROR,
            ErrorClass::Transient => REASON_TRANSIENT_ERROR,
            ErrorClass::Migration => REASON_MIGRATION_ERROR,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ErrorClass::Transient)
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("{operation} failed: {source:#}")]
    Executor {
        operation: &'static str,
        source: anyhow::Error,
    },
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("{0}")]
    Migration(String),
}

impl ReconcileError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ReconcileError::Configuration(message.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ReconcileError::Io {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Configuration(_) => ErrorClass::Configuration,
            ReconcileError::Migration(_) => ErrorClass::Migration,
            ReconcileError::Access(_)
            | ReconcileError::Io { .. }
            | ReconcileError::Executor { .. }
            | ReconcileError::Timeout { .. } => ErrorClass::Transient,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.class().reason()
    }

    /// Text recorded in the condition message and the warning event
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string().trim().to_string()
    }
}
