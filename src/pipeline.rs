use serde::Serialize;
use tracing::{info, warn};

use crate::config::EvaluationOptions;
use crate::error::PeriodError;
use crate::merge::{merge_periods, MergedTable};
use crate::models::{NormalizedRecord, Period};
use crate::normalize::normalize_period;
use crate::source::RawTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PeriodStatus {
    NotProvided,
    Unreadable { message: String },
    MissingColumns { missing: Vec<String> },
    EmptyAfterFilter { rows_read: usize },
    Loaded { rows_read: usize, records: usize },
}

impl PeriodStatus {
    fn from_error(err: PeriodError) -> Self {
        match err {
            PeriodError::InputUnreadable { message, .. } => PeriodStatus::Unreadable { message },
            PeriodError::MissingRequiredColumn { missing, .. } => {
                PeriodStatus::MissingColumns { missing }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub status: PeriodStatus,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Evaluation {
    /// No period input was supplied at all.
    NoInputs,
    /// Inputs were supplied but none produced a record for the selected class.
    Empty { periods: Vec<PeriodReport> },
    Ready {
        periods: Vec<PeriodReport>,
        result: MergedTable,
    },
}

impl Evaluation {
    pub fn periods(&self) -> &[PeriodReport] {
        match self {
            Evaluation::NoInputs => &[],
            Evaluation::Empty { periods } | Evaluation::Ready { periods, .. } => periods.as_slice(),
        }
    }

    pub fn result(&self) -> Option<&MergedTable> {
        match self {
            Evaluation::Ready { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Runs every supplied period through the normalizer, then merges and
/// classifies whatever succeeded. A failing period only affects its own
/// status entry.
pub fn evaluate(
    tables: [Option<Result<RawTable, PeriodError>>; 3],
    options: &EvaluationOptions,
) -> Evaluation {
    if tables.iter().all(Option::is_none) {
        info!("no period inputs supplied");
        return Evaluation::NoInputs;
    }

    let mut periods = Vec::with_capacity(3);
    let mut normalized: Vec<(Period, Vec<NormalizedRecord>)> = Vec::new();

    for (period, slot) in Period::ALL.into_iter().zip(tables) {
        let status = match slot {
            None => PeriodStatus::NotProvided,
            Some(Err(err)) => {
                warn!(%period, error = %err, "skipping period");
                PeriodStatus::from_error(err)
            }
            Some(Ok(table)) => {
                let mapping = options.mappings.for_period(period);
                match normalize_period(period, &table, &mapping, options.filter) {
                    Err(err) => {
                        warn!(%period, error = %err, "skipping period");
                        PeriodStatus::from_error(err)
                    }
                    Ok(records) if records.is_empty() => {
                        info!(%period, rows_read = table.rows.len(), "no rows match the selected class");
                        PeriodStatus::EmptyAfterFilter {
                            rows_read: table.rows.len(),
                        }
                    }
                    Ok(records) => {
                        let status = PeriodStatus::Loaded {
                            rows_read: table.rows.len(),
                            records: records.len(),
                        };
                        normalized.push((period, records));
                        status
                    }
                }
            }
        };
        periods.push(PeriodReport { period, status });
    }

    let merged = merge_periods(
        normalized
            .iter()
            .map(|(period, records)| (*period, records.as_slice())),
        options.join_key,
    );

    match merged {
        Some(result) => Evaluation::Ready { periods, result },
        None => Evaluation::Empty { periods },
    }
}
