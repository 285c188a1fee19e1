use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "period-1")]
    First,
    #[serde(rename = "period-2")]
    Second,
    #[serde(rename = "end-of-term")]
    EndOfTerm,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::First, Period::Second, Period::EndOfTerm];

    pub fn label(self) -> &'static str {
        match self {
            Period::First => "period-1",
            Period::Second => "period-2",
            Period::EndOfTerm => "end-of-term",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Period::First => 0,
            Period::Second => 1,
            Period::EndOfTerm => 2,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Arabic,
    Mathematics,
    Science,
    English,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Subject::Arabic => "Arabic",
            Subject::Mathematics => "Mathematics",
            Subject::Science => "Science",
            Subject::English => "English",
        };
        f.write_str(label)
    }
}

/// Primary grade level, 1 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeLevel(u8);

impl GradeLevel {
    pub fn new(value: u8) -> Option<Self> {
        (1..=6).contains(&value).then_some(GradeLevel(value))
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "First Primary",
            2 => "Second Primary",
            3 => "Third Primary",
            4 => "Fourth Primary",
            5 => "Fifth Primary",
            _ => "Sixth Primary",
        }
    }
}

/// Class section, 1 through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Section(u8);

impl Section {
    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Section(value))
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassFilter {
    pub grade: GradeLevel,
    pub section: Section,
}

/// Source header names for the five logical fields of one period export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub student_id: String,
    pub student_name: String,
    pub grade: String,
    pub section: String,
    pub score: String,
}

impl ColumnMapping {
    pub fn identity() -> Self {
        ColumnMapping {
            student_id: "student_id".to_string(),
            student_name: "student_name".to_string(),
            grade: "grade".to_string(),
            section: "section".to_string(),
            score: "score".to_string(),
        }
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        ColumnMapping::identity()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub student_id: String,
    pub student_name: String,
    pub grade: Option<i64>,
    pub section: Option<i64>,
    pub score: Option<f64>,
    pub period: Period,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Weak,
    Average,
    Excellent,
    NoData,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Weak => "weak",
            Classification::Average => "average",
            Classification::Excellent => "excellent",
            Classification::NoData => "no-data",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub student_name: String,
    pub period_1: Option<f64>,
    pub period_2: Option<f64>,
    pub end_of_term: Option<f64>,
    pub average_score: Option<f64>,
    pub classification: Classification,
}

impl StudentRecord {
    pub fn score(&self, period: Period) -> Option<f64> {
        match period {
            Period::First => self.period_1,
            Period::Second => self.period_2,
            Period::EndOfTerm => self.end_of_term,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAverage {
    pub period: Period,
    pub average: f64,
    pub scored_students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: Period,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub weak: usize,
    pub average: usize,
    pub excellent: usize,
    pub no_data: usize,
}
