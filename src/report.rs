use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::EvaluationOptions;
use crate::error::ViewUnavailable;
use crate::merge::MergedTable;
use crate::models::{Classification, Period, PeriodAverage, StudentRecord, SummaryCounts, TrendPoint};
use crate::pipeline::{Evaluation, PeriodStatus};

fn score_cell(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.2}"),
        None => "-".to_string(),
    }
}

fn status_line(status: &PeriodStatus) -> String {
    match status {
        PeriodStatus::NotProvided => "not provided".to_string(),
        PeriodStatus::Unreadable { message } => format!("unreadable ({message})"),
        PeriodStatus::MissingColumns { missing } => {
            format!("mapping error, missing columns: {}", missing.join(", "))
        }
        PeriodStatus::EmptyAfterFilter { rows_read } => {
            format!("{rows_read} rows read, none match the selected class")
        }
        PeriodStatus::Loaded { rows_read, records } => {
            format!("{records} of {rows_read} rows loaded")
        }
    }
}

fn write_roster(output: &mut String, table: &MergedTable, students: &[&StudentRecord]) {
    let header: Vec<&str> = table.participating.iter().map(|p| p.label()).collect();
    let _ = writeln!(
        output,
        "| Student ID | Name | {} | Average |",
        header.join(" | ")
    );
    let _ = writeln!(output, "|{}", "---|".repeat(header.len() + 3));
    for student in students {
        let scores: Vec<String> = table
            .participating
            .iter()
            .map(|&period| score_cell(student.score(period)))
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            student.student_id,
            student.student_name,
            scores.join(" | "),
            score_cell(student.average_score)
        );
    }
}

fn write_tier(output: &mut String, table: &MergedTable, title: &str, tier: Classification) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    let students = table.roster(tier);
    if students.is_empty() {
        let _ = writeln!(output, "No {tier} students under the current thresholds.");
    } else {
        write_roster(output, table, &students);
    }
}

pub fn build_report(
    evaluation: &Evaluation,
    options: &EvaluationOptions,
    generated_on: NaiveDate,
    student: Option<&str>,
) -> String {
    let mut output = String::new();
    let grade = options.filter.grade;

    let _ = writeln!(output, "# {} Results by Period", options.subject);
    let _ = writeln!(
        output,
        "Generated {} for {} (grade {}), section {}",
        generated_on,
        grade.label(),
        grade.value(),
        options.filter.section.value()
    );

    let table = match evaluation {
        Evaluation::NoInputs => {
            let _ = writeln!(output);
            let _ = writeln!(output, "Supply at least one period file to see statistics.");
            return output;
        }
        Evaluation::Empty { .. } => None,
        Evaluation::Ready { result, .. } => Some(result),
    };

    let _ = writeln!(output);
    let _ = writeln!(output, "## Period Inputs");
    for report in evaluation.periods() {
        let _ = writeln!(output, "- {}: {}", report.period, status_line(&report.status));
    }

    let Some(table) = table else {
        let filtered_out = evaluation
            .periods()
            .iter()
            .any(|report| matches!(report.status, PeriodStatus::EmptyAfterFilter { .. }));
        let _ = writeln!(output);
        if filtered_out {
            let _ = writeln!(
                output,
                "No data remains after filtering on the selected grade and section."
            );
        } else {
            let _ = writeln!(output, "None of the supplied period files could be loaded.");
        }
        return output;
    };

    let counts = table.summary();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Students in class: {}", counts.total);
    let _ = writeln!(output, "- Weak (< 50): {}", counts.weak);
    let _ = writeln!(output, "- Excellent (>= 90): {}", counts.excellent);
    let _ = writeln!(output, "- Average tier: {}", counts.average);
    let _ = writeln!(output, "- No data: {}", counts.no_data);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");
    let header: Vec<&str> = table.participating.iter().map(|p| p.label()).collect();
    let _ = writeln!(
        output,
        "| Student ID | Name | {} | Average | Classification |",
        header.join(" | ")
    );
    let _ = writeln!(output, "|{}", "---|".repeat(header.len() + 4));
    for record in &table.students {
        let scores: Vec<String> = table
            .participating
            .iter()
            .map(|&period| score_cell(record.score(period)))
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            record.student_id,
            record.student_name,
            scores.join(" | "),
            score_cell(record.average_score),
            record.classification
        );
    }

    write_tier(&mut output, table, "Weak Students (< 50)", Classification::Weak);
    write_tier(
        &mut output,
        table,
        "Excellent Students (>= 90)",
        Classification::Excellent,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Period Comparison");
    match table.period_comparison() {
        Ok(averages) if averages.is_empty() => {
            let _ = writeln!(output, "No scores recorded in any period.");
        }
        Ok(averages) => {
            for average in &averages {
                let _ = writeln!(
                    output,
                    "- {}: class average {:.2} across {} students",
                    average.period, average.average, average.scored_students
                );
            }
        }
        Err(ViewUnavailable::InsufficientPeriods { .. }) => {
            let _ = writeln!(
                output,
                "Supply at least two period files to compare periods."
            );
        }
        Err(other) => {
            let _ = writeln!(output, "{other}");
        }
    }

    if let Some(name) = student {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Progress: {name}");
        match table.student_trend(name) {
            Ok(points) => {
                for point in points {
                    let _ = writeln!(output, "- {}: {}", point.period, score_cell(point.score));
                }
            }
            Err(reason) => {
                let _ = writeln!(output, "{reason}.");
            }
        }
    }

    output
}

/// A derived view in the JSON output, tagged like the other enums there.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum View<T> {
    Available { values: T },
    Unavailable(ViewUnavailable),
}

impl<T> From<Result<T, ViewUnavailable>> for View<T> {
    fn from(result: Result<T, ViewUnavailable>) -> Self {
        match result {
            Ok(values) => View::Available { values },
            Err(reason) => View::Unavailable(reason),
        }
    }
}

/// Machine-readable rendering of one evaluation pass.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub evaluation: &'a Evaluation,
    pub summary: Option<SummaryCounts>,
    pub period_comparison: Option<View<Vec<PeriodAverage>>>,
    pub student_trend: Option<View<Vec<TrendPoint>>>,
}

pub fn build_json(evaluation: &Evaluation, student: Option<&str>) -> anyhow::Result<String> {
    let table = evaluation.result();
    let report = JsonReport {
        evaluation,
        summary: table.map(MergedTable::summary),
        period_comparison: table.map(|table| table.period_comparison().into()),
        student_trend: table
            .zip(student)
            .map(|(table, name)| table.student_trend(name).into()),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    student_id: &'a str,
    student_name: &'a str,
    #[serde(rename = "period-1")]
    period_1: Option<f64>,
    #[serde(rename = "period-2")]
    period_2: Option<f64>,
    #[serde(rename = "end-of-term")]
    end_of_term: Option<f64>,
    average_score: Option<f64>,
    classification: Classification,
}

/// The student table as CSV. Empty cells stand for missing scores.
pub fn build_csv(evaluation: &Evaluation) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if let Some(table) = evaluation.result() {
        for student in &table.students {
            writer.serialize(CsvRow {
                student_id: &student.student_id,
                student_name: &student.student_name,
                period_1: student.score(Period::First),
                period_2: student.score(Period::Second),
                end_of_term: student.score(Period::EndOfTerm),
                average_score: student.average_score,
                classification: student.classification,
            })?;
        }
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
