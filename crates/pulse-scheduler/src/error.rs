use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::feed::FeedError;

/// Errors surfaced by the scheduler API.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Malformed input; nothing was created.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No active pulse with the given id.
    #[error("Pulse not found or not active: {id}")]
    NotFound { id: String },

    /// A pulse with this id is already running.
    #[error("Pulse already active: {id}")]
    Conflict { id: String },

    /// Fetch or analysis failed during a tick. Only ever logged by the tick
    /// task; never returned from `start`.
    #[error("Analysis failed: {0}")]
    TransientAnalysis(String),

    #[error("History store error: {0}")]
    History(#[from] HistoryError),
}

impl From<AnalysisError> for PulseError {
    fn from(e: AnalysisError) -> Self {
        PulseError::TransientAnalysis(e.to_string())
    }
}

impl From<FeedError> for PulseError {
    fn from(e: FeedError) -> Self {
        PulseError::TransientAnalysis(e.to_string())
    }
}

/// Errors from the durable cycle log.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("history store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, PulseError>;
