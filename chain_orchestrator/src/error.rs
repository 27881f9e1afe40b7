//! Error taxonomy for registry, chain and invocation failures.
//!
//! Only [`ChainError::NotFound`] and [`ChainError::Cancelled`] ever escape a
//! chain run. Invocation failures are folded into the report as failed steps.

use thiserror::Error;

use crate::orchestrator::ChainReport;

/// Errors surfaced by the registry and the chain orchestrator.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A capability descriptor was rejected at registration time.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An explicitly requested capability is not registered.
    #[error("capability {0:?} not found")]
    NotFound(String),

    /// The chain was cancelled at a step boundary. Carries the partial report.
    #[error("chain cancelled after {completed} step(s)")]
    Cancelled {
        completed: usize,
        report: Box<ChainReport>,
    },
}

impl ChainError {
    /// Partial report attached to a cancellation, if any.
    pub fn partial_report(&self) -> Option<&ChainReport> {
        match self {
            ChainError::Cancelled { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

/// The invocation collaborator could not attempt the call at all.
///
/// Distinct from an [`InvocationOutcome`](crate::invoker::InvocationOutcome)
/// with `success == false`, which means the capability ran and failed.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The capability process could not be spawned.
    #[error("failed to spawn capability process: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O failure while waiting on the capability process.
    #[error("I/O error while invoking capability: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
