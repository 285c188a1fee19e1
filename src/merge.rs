use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{classify, mean_of_present};
use crate::error::ViewUnavailable;
use crate::models::{
    Classification, NormalizedRecord, Period, PeriodAverage, StudentRecord, SummaryCounts,
    TrendPoint,
};

/// How rows from different periods are recognised as the same student.
///
/// `IdAndName` requires both fields to match exactly, so a name spelled
/// differently across exports yields two students. `IdOnly` keys on the
/// identifier and keeps the first name seen in period order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum JoinKey {
    #[default]
    IdAndName,
    IdOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StudentKey {
    student_id: String,
    student_name: Option<String>,
}

impl StudentKey {
    fn of(record: &NormalizedRecord, join_key: JoinKey) -> Self {
        StudentKey {
            student_id: record.student_id.clone(),
            student_name: match join_key {
                JoinKey::IdAndName => Some(record.student_name.clone()),
                JoinKey::IdOnly => None,
            },
        }
    }
}

struct MergedRow {
    student_id: String,
    student_name: String,
    scores: [Option<f64>; 3],
    seen: [bool; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTable {
    pub participating: Vec<Period>,
    pub students: Vec<StudentRecord>,
}

/// Outer-joins the period record sets on student identity and classifies
/// every student. Returns `None` when no period contributed a single record.
///
/// Periods are visited in their fixed order whatever order they are passed
/// in, so the resulting table does not depend on argument order.
pub fn merge_periods<'a, I>(sets: I, join_key: JoinKey) -> Option<MergedTable>
where
    I: IntoIterator<Item = (Period, &'a [NormalizedRecord])>,
{
    let mut by_period: BTreeMap<Period, Vec<&NormalizedRecord>> = BTreeMap::new();
    for (period, records) in sets {
        if records.is_empty() {
            continue;
        }
        by_period.entry(period).or_default().extend(records.iter());
    }

    if by_period.is_empty() {
        return None;
    }

    let mut index: HashMap<StudentKey, usize> = HashMap::new();
    let mut rows: Vec<MergedRow> = Vec::new();

    for (period, records) in &by_period {
        let slot = period.index();
        let mut duplicates = 0usize;

        for record in records {
            let key = StudentKey::of(record, join_key);
            let position = *index.entry(key).or_insert_with(|| {
                rows.push(MergedRow {
                    student_id: record.student_id.clone(),
                    student_name: record.student_name.clone(),
                    scores: [None; 3],
                    seen: [false; 3],
                });
                rows.len() - 1
            });

            let row = &mut rows[position];
            if row.seen[slot] {
                duplicates += 1;
                continue;
            }
            row.seen[slot] = true;
            row.scores[slot] = record.score;
        }

        if duplicates > 0 {
            warn!(%period, duplicates, "duplicate student rows ignored, first row kept");
        }
    }

    let students: Vec<StudentRecord> = rows
        .into_iter()
        .map(|row| {
            let [period_1, period_2, end_of_term] = row.scores;
            let average_score = mean_of_present(&row.scores);
            StudentRecord {
                student_id: row.student_id,
                student_name: row.student_name,
                period_1,
                period_2,
                end_of_term,
                average_score,
                classification: classify(end_of_term, average_score),
            }
        })
        .collect();

    let participating: Vec<Period> = by_period.keys().copied().collect();
    info!(
        periods = participating.len(),
        students = students.len(),
        "merged period records"
    );

    Some(MergedTable {
        participating,
        students,
    })
}

impl MergedTable {
    pub fn summary(&self) -> SummaryCounts {
        let mut counts = SummaryCounts {
            total: self.students.len(),
            ..SummaryCounts::default()
        };
        for student in &self.students {
            match student.classification {
                Classification::Weak => counts.weak += 1,
                Classification::Average => counts.average += 1,
                Classification::Excellent => counts.excellent += 1,
                Classification::NoData => counts.no_data += 1,
            }
        }
        counts
    }

    pub fn roster(&self, tier: Classification) -> Vec<&StudentRecord> {
        self.students
            .iter()
            .filter(|student| student.classification == tier)
            .collect()
    }

    /// Mean score of each participating period; periods without a single
    /// score are left out rather than reported as zero.
    pub fn class_averages(&self) -> Vec<PeriodAverage> {
        self.participating
            .iter()
            .filter_map(|&period| {
                let scores: Vec<f64> = self
                    .students
                    .iter()
                    .filter_map(|student| student.score(period))
                    .collect();
                if scores.is_empty() {
                    return None;
                }
                Some(PeriodAverage {
                    period,
                    average: scores.iter().sum::<f64>() / scores.len() as f64,
                    scored_students: scores.len(),
                })
            })
            .collect()
    }

    fn comparison_gate(&self) -> Result<(), ViewUnavailable> {
        if self.participating.len() < 2 {
            return Err(ViewUnavailable::InsufficientPeriods {
                participating: self.participating.len(),
            });
        }
        Ok(())
    }

    pub fn period_comparison(&self) -> Result<Vec<PeriodAverage>, ViewUnavailable> {
        self.comparison_gate()?;
        Ok(self.class_averages())
    }

    /// Scores of the first student with this exact name, one point per
    /// participating period. Missing scores stay as `None`.
    pub fn student_trend(&self, name: &str) -> Result<Vec<TrendPoint>, ViewUnavailable> {
        self.comparison_gate()?;
        let student = self
            .students
            .iter()
            .find(|student| student.student_name == name)
            .ok_or_else(|| ViewUnavailable::UnknownStudent {
                name: name.to_string(),
            })?;

        Ok(self
            .participating
            .iter()
            .map(|&period| TrendPoint {
                period,
                score: student.score(period),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(period: Period, id: &str, name: &str, score: Option<f64>) -> NormalizedRecord {
        NormalizedRecord {
            student_id: id.to_string(),
            student_name: name.to_string(),
            grade: Some(4),
            section: Some(1),
            score,
            period,
        }
    }

    fn three_periods() -> (Vec<NormalizedRecord>, Vec<NormalizedRecord>, Vec<NormalizedRecord>) {
        let first = vec![
            record(Period::First, "1", "Avery Lee", Some(80.0)),
            record(Period::First, "2", "Jules Moreno", Some(40.0)),
        ];
        let second = vec![
            record(Period::Second, "2", "Jules Moreno", Some(50.0)),
            record(Period::Second, "3", "Kiara Patel", Some(95.0)),
        ];
        let end = vec![
            record(Period::EndOfTerm, "1", "Avery Lee", Some(60.0)),
            record(Period::EndOfTerm, "4", "Noor Haddad", None),
        ];
        (first, second, end)
    }

    fn find<'a>(table: &'a MergedTable, id: &str) -> &'a StudentRecord {
        table
            .students
            .iter()
            .find(|s| s.student_id == id)
            .unwrap()
    }

    #[test]
    fn outer_join_keeps_every_student_once() {
        let (first, second, end) = three_periods();
        let table = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();

        assert_eq!(table.students.len(), 4);
        let kiara = find(&table, "3");
        assert_eq!(kiara.period_1, None);
        assert_eq!(kiara.period_2, Some(95.0));
        assert_eq!(kiara.end_of_term, None);
        assert_eq!(kiara.classification, Classification::Excellent);
    }

    #[test]
    fn average_uses_present_scores_only() {
        let (first, second, end) = three_periods();
        let table = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();

        let avery = find(&table, "1");
        assert_eq!(avery.period_1, Some(80.0));
        assert_eq!(avery.period_2, None);
        assert_eq!(avery.end_of_term, Some(60.0));
        assert_eq!(avery.average_score, Some(70.0));
        assert_eq!(avery.classification, Classification::Average);

        let jules = find(&table, "2");
        assert_eq!(jules.average_score, Some(45.0));
        assert_eq!(jules.classification, Classification::Weak);

        let noor = find(&table, "4");
        assert_eq!(noor.average_score, None);
        assert_eq!(noor.classification, Classification::NoData);
    }

    #[test]
    fn end_of_term_overrides_average() {
        let first = vec![record(Period::First, "9", "Sam", Some(100.0))];
        let second = vec![record(Period::Second, "9", "Sam", Some(100.0))];
        let end = vec![record(Period::EndOfTerm, "9", "Sam", Some(45.0))];
        let table = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();
        let sam = &table.students[0];
        assert!(sam.average_score.unwrap() > 80.0);
        assert_eq!(sam.classification, Classification::Weak);
    }

    #[test]
    fn argument_order_does_not_change_the_table() {
        let (first, second, end) = three_periods();
        let forward = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        );
        let reversed = merge_periods(
            [
                (Period::EndOfTerm, end.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::First, first.as_slice()),
            ],
            JoinKey::IdAndName,
        );
        let shuffled = merge_periods(
            [
                (Period::Second, second.as_slice()),
                (Period::First, first.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        );
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn name_mismatch_splits_students_unless_keyed_on_id() {
        let first = vec![record(Period::First, "1", "Avery Lee", Some(80.0))];
        let second = vec![record(Period::Second, "1", "Avery  Lee", Some(60.0))];
        let sets = [
            (Period::First, first.as_slice()),
            (Period::Second, second.as_slice()),
        ];

        let strict = merge_periods(sets, JoinKey::IdAndName).unwrap();
        assert_eq!(strict.students.len(), 2);

        let by_id = merge_periods(sets, JoinKey::IdOnly).unwrap();
        assert_eq!(by_id.students.len(), 1);
        assert_eq!(by_id.students[0].student_name, "Avery Lee");
        assert_eq!(by_id.students[0].average_score, Some(70.0));
    }

    #[test]
    fn duplicate_rows_in_one_period_keep_the_first() {
        let first = vec![
            record(Period::First, "1", "Avery Lee", Some(80.0)),
            record(Period::First, "1", "Avery Lee", Some(20.0)),
        ];
        let table = merge_periods([(Period::First, first.as_slice())], JoinKey::IdAndName).unwrap();
        assert_eq!(table.students.len(), 1);
        assert_eq!(table.students[0].period_1, Some(80.0));
    }

    #[test]
    fn no_records_yields_no_table() {
        let empty: Vec<NormalizedRecord> = Vec::new();
        let nothing: Vec<(Period, &[NormalizedRecord])> = Vec::new();
        assert!(merge_periods(nothing, JoinKey::IdAndName).is_none());
        assert!(merge_periods([(Period::First, empty.as_slice())], JoinKey::IdAndName).is_none());
    }

    #[test]
    fn single_period_disables_comparison() {
        let first = vec![
            record(Period::First, "1", "Avery Lee", Some(72.0)),
            record(Period::First, "2", "Jules Moreno", Some(91.0)),
        ];
        let table = merge_periods([(Period::First, first.as_slice())], JoinKey::IdAndName).unwrap();

        assert_eq!(table.participating, vec![Period::First]);
        let avery = find(&table, "1");
        assert_eq!(avery.period_2, None);
        assert_eq!(avery.end_of_term, None);
        assert_eq!(avery.average_score, Some(72.0));
        assert_eq!(
            table.period_comparison(),
            Err(ViewUnavailable::InsufficientPeriods { participating: 1 })
        );
        assert!(table.student_trend("Avery Lee").is_err());
    }

    #[test]
    fn class_averages_skip_periods_without_scores() {
        let first = vec![
            record(Period::First, "1", "Avery Lee", Some(80.0)),
            record(Period::First, "2", "Jules Moreno", Some(60.0)),
        ];
        let second = vec![record(Period::Second, "1", "Avery Lee", None)];
        let end = vec![record(Period::EndOfTerm, "2", "Jules Moreno", Some(90.0))];
        let table = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();

        let averages = table.period_comparison().unwrap();
        assert_eq!(
            averages,
            vec![
                PeriodAverage {
                    period: Period::First,
                    average: 70.0,
                    scored_students: 2,
                },
                PeriodAverage {
                    period: Period::EndOfTerm,
                    average: 90.0,
                    scored_students: 1,
                },
            ]
        );
    }

    #[test]
    fn student_trend_lists_participating_periods_in_order() {
        let (first, second, end) = three_periods();
        let table = merge_periods(
            [
                (Period::EndOfTerm, end.as_slice()),
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();

        let trend = table.student_trend("Avery Lee").unwrap();
        assert_eq!(
            trend,
            vec![
                TrendPoint {
                    period: Period::First,
                    score: Some(80.0),
                },
                TrendPoint {
                    period: Period::Second,
                    score: None,
                },
                TrendPoint {
                    period: Period::EndOfTerm,
                    score: Some(60.0),
                },
            ]
        );
        assert_eq!(
            table.student_trend("Nobody"),
            Err(ViewUnavailable::UnknownStudent {
                name: "Nobody".to_string()
            })
        );
    }

    #[test]
    fn summary_counts_tiers() {
        let (first, second, end) = three_periods();
        let table = merge_periods(
            [
                (Period::First, first.as_slice()),
                (Period::Second, second.as_slice()),
                (Period::EndOfTerm, end.as_slice()),
            ],
            JoinKey::IdAndName,
        )
        .unwrap();

        let counts = table.summary();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.weak, 1);
        assert_eq!(counts.excellent, 1);
        assert_eq!(counts.average, 1);
        assert_eq!(counts.no_data, 1);
        assert_eq!(table.roster(Classification::Weak)[0].student_id, "2");
    }
}
