use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::merge::JoinKey;
use crate::models::{ClassFilter, ColumnMapping, Period, Subject};

/// Per-period column mappings, as stored in the mapping JSON file. Periods
/// without an entry use the identity mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingFile {
    #[serde(rename = "period-1", default, skip_serializing_if = "Option::is_none")]
    pub period_1: Option<ColumnMapping>,
    #[serde(rename = "period-2", default, skip_serializing_if = "Option::is_none")]
    pub period_2: Option<ColumnMapping>,
    #[serde(rename = "end-of-term", default, skip_serializing_if = "Option::is_none")]
    pub end_of_term: Option<ColumnMapping>,
}

impl MappingFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid mapping file {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn template() -> Self {
        MappingFile {
            period_1: Some(ColumnMapping::identity()),
            period_2: Some(ColumnMapping::identity()),
            end_of_term: Some(ColumnMapping::identity()),
        }
    }

    pub fn for_period(&self, period: Period) -> ColumnMapping {
        let mapping = match period {
            Period::First => &self.period_1,
            Period::Second => &self.period_2,
            Period::EndOfTerm => &self.end_of_term,
        };
        mapping.clone().unwrap_or_default()
    }
}

/// Everything one evaluation pass needs besides the period tables.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    pub subject: Subject,
    pub filter: ClassFilter,
    pub join_key: JoinKey,
    pub mappings: MappingFile,
}
