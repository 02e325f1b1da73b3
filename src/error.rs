//! Error types for the solver-orchestration core
//!
//! Mirrors the error kinds a caller needs to distinguish: a lower layer
//! that simply couldn't answer (`Transport`), one that ran out of time
//! (`Timeout`), one that was interrupted by the user (`Interrupted`), an
//! internal invariant that doesn't hold (`Invariant`, fatal), and a bad
//! setup at construction time (`Configuration`).

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the solver stack.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver transport failure: {reason}")]
    Transport { reason: String },

    #[error("solver timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("solver interrupted")]
    Interrupted,

    #[error("internal invariant violated: {what}")]
    Invariant { what: String },

    #[error("bad solver configuration: {what}")]
    Configuration { what: String },

    #[error("could not open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("replay mismatch: expected {expected:?}, received {received:?}")]
    ReplayMismatch { expected: String, received: String },
}

impl SolverError {
    pub fn transport(reason: impl Into<String>) -> Self {
        SolverError::Transport { reason: reason.into() }
    }

    pub fn invariant(what: impl Into<String>) -> Self {
        SolverError::Invariant { what: what.into() }
    }

    pub fn configuration(what: impl Into<String>) -> Self {
        SolverError::Configuration { what: what.into() }
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
