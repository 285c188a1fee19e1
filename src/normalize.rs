use tracing::debug;

use crate::error::PeriodError;
use crate::models::{ClassFilter, ColumnMapping, NormalizedRecord, Period};
use crate::source::RawTable;

struct ColumnIndexes {
    student_id: usize,
    student_name: usize,
    grade: usize,
    section: usize,
    score: usize,
}

/// Resolves every mapped column up front so a bad mapping fails before any row is read.
fn resolve_columns(
    period: Period,
    table: &RawTable,
    mapping: &ColumnMapping,
) -> Result<ColumnIndexes, PeriodError> {
    let names = [
        mapping.student_id.as_str(),
        mapping.student_name.as_str(),
        mapping.grade.as_str(),
        mapping.section.as_str(),
        mapping.score.as_str(),
    ];
    let found = names.map(|name| table.column_index(name.trim()));

    match found {
        [Some(student_id), Some(student_name), Some(grade), Some(section), Some(score)] => {
            Ok(ColumnIndexes {
                student_id,
                student_name,
                grade,
                section,
                score,
            })
        }
        _ => {
            let mut missing: Vec<String> = Vec::new();
            for (name, index) in names.iter().zip(found) {
                if index.is_none() && !missing.iter().any(|seen| seen == name) {
                    missing.push(name.to_string());
                }
            }
            Err(PeriodError::MissingRequiredColumn { period, missing })
        }
    }
}

pub fn coerce_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Integral numbers only: "4" and "4.0" coerce, "4.5" does not.
pub fn coerce_integer(raw: &str) -> Option<i64> {
    let value = coerce_number(raw)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Projects one period export onto the standard record schema and keeps only
/// rows of the selected grade and section. An empty result is a normal outcome.
pub fn normalize_period(
    period: Period,
    table: &RawTable,
    mapping: &ColumnMapping,
    filter: ClassFilter,
) -> Result<Vec<NormalizedRecord>, PeriodError> {
    let columns = resolve_columns(period, table, mapping)?;
    let grade = filter.grade.value();
    let section = filter.section.value();

    let mut records = Vec::new();
    for row in 0..table.rows.len() {
        let record = NormalizedRecord {
            student_id: table.cell(row, columns.student_id).to_string(),
            student_name: table.cell(row, columns.student_name).to_string(),
            grade: coerce_integer(table.cell(row, columns.grade)),
            section: coerce_integer(table.cell(row, columns.section)),
            score: coerce_number(table.cell(row, columns.score)),
            period,
        };

        if record.grade == Some(grade) && record.section == Some(section) {
            records.push(record);
        }
    }

    debug!(
        %period,
        rows_read = table.rows.len(),
        rows_kept = records.len(),
        rows_filtered = table.rows.len() - records.len(),
        "normalized period"
    );
    Ok(records)
}
