use backend::hal::HeError;
use thiserror::Error;

use crate::{protocol::DayState, table::LookupFunction};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the ratio protocol. Any of them aborts the current date.
#[derive(Debug, Error)]
pub enum Error {
    /// A key, parameter, table or config artifact is missing or unreadable.
    #[error("setup: {0}")]
    Setup(String),

    /// The table difference has no zero crossing: the input lies outside the
    /// table's domain.
    #[error("{function}: input outside the table domain (no zero crossing)")]
    TableDomain { function: LookupFunction },

    #[error("noise budget exhausted before {op} ({remaining} bits left)")]
    NoiseBudgetExhausted { op: &'static str, remaining: u32 },

    /// Intermediate state is missing, truncated, malformed or has the wrong
    /// ciphertext count.
    #[error("state handoff {key}: {reason}")]
    StateHandoff { key: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cancelled before {stage}")]
    Cancelled { stage: DayState },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    He(HeError),
}

impl From<HeError> for Error {
    fn from(err: HeError) -> Self {
        match err {
            HeError::NoiseBudgetExhausted { op, remaining } => Error::NoiseBudgetExhausted { op, remaining },
            other => Error::He(other),
        }
    }
}

impl Error {
    pub(crate) fn handoff(key: impl ToString, reason: impl ToString) -> Self {
        Error::StateHandoff {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
