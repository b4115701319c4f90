use thiserror::Error;

use crate::domain::ParameterSnapshot;
use crate::optimizer::SolveStatus;

/// Failures of a single optimization run.
///
/// Only [`OptimizationError::SolverFault`] is worth retrying; everything else
/// needs different input before another attempt can succeed.
#[derive(Debug, Clone, Error)]
pub enum OptimizationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bidding problem is infeasible ({snapshot})")]
    Infeasible { snapshot: ParameterSnapshot },

    #[error("Bidding problem is unbounded ({snapshot})")]
    Unbounded { snapshot: ParameterSnapshot },

    #[error("Solver fault: {message} ({snapshot})")]
    SolverFault {
        message: String,
        snapshot: ParameterSnapshot,
    },

    #[error("Cannot extract results from a {status} solve: {reason}")]
    Extraction { status: SolveStatus, reason: String },
}

impl OptimizationError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        OptimizationError::InvalidInput(message.into())
    }

    /// Whether the caller may retry the same call unchanged
    pub fn is_retriable(&self) -> bool {
        matches!(self, OptimizationError::SolverFault { .. })
    }

    /// Parameters that produced the failed solve, if the failure came from the solver
    pub fn snapshot(&self) -> Option<&ParameterSnapshot> {
        match self {
            OptimizationError::Infeasible { snapshot }
            | OptimizationError::Unbounded { snapshot }
            | OptimizationError::SolverFault { snapshot, .. } => Some(snapshot),
            OptimizationError::InvalidInput(_) | OptimizationError::Extraction { .. } => None,
        }
    }
}
