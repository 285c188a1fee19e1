use serde::Serialize;
use thiserror::Error;

use crate::models::Period;

/// Failures that are local to one period input. None of them abort the
/// evaluation of the other periods.
#[derive(Error, Debug)]
pub enum PeriodError {
    #[error("{period} input is unreadable: {message}")]
    InputUnreadable { period: Period, message: String },

    #[error("{period} mapping references missing columns: {}", missing.join(", "))]
    MissingRequiredColumn {
        period: Period,
        missing: Vec<String>,
    },
}

impl PeriodError {
    pub fn unreadable(period: Period, err: impl std::fmt::Display) -> Self {
        PeriodError::InputUnreadable {
            period,
            message: err.to_string(),
        }
    }
}

/// Why a derived view cannot be produced. These are informational states,
/// not failures of the evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ViewUnavailable {
    #[error("period comparison needs at least two periods with data, found {participating}")]
    InsufficientPeriods { participating: usize },

    #[error("no student named {name:?}")]
    UnknownStudent { name: String },
}
