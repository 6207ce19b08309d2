//! Query predicates and result windows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, HandlerRegistry};
use crate::input::{VariantRecord, is_missing_value, parse_number};

/// Condition on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Field text equals the value.
    Exact { value: String },
    /// Field text equals one of the values.
    OneOf { values: Vec<String> },
    /// Some numeric value (or component) lies in `[min, max]`; open ends
    /// are unbounded.
    Range { min: Option<f64>, max: Option<f64> },
    /// At least one of the callers supports the record.
    Callers { callers: Vec<String> },
}

impl Criterion {
    fn matches_text(&self, text: Option<&str>) -> bool {
        let Some(text) = text.filter(|t| !is_missing_value(t)) else {
            return false;
        };
        match self {
            Criterion::Exact { value } => text == value,
            Criterion::OneOf { values } => values.iter().any(|v| v == text),
            Criterion::Range { min, max } => text
                .split(',')
                .filter_map(parse_number)
                .any(|n| min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)),
            Criterion::Callers { .. } => false,
        }
    }
}

/// Conjunction of per-field criteria. An empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate {
    criteria: IndexMap<String, Criterion>,
}

impl Predicate {
    /// Predicate matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_criteria(criteria: IndexMap<String, Criterion>) -> Self {
        Self { criteria }
    }

    pub fn exact(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria
            .insert(field.into(), Criterion::Exact { value: value.into() });
        self
    }

    pub fn one_of<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.criteria.insert(field.into(), Criterion::OneOf { values });
        self
    }

    pub fn range(mut self, field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.criteria.insert(field.into(), Criterion::Range { min, max });
        self
    }

    pub fn callers<I, S>(mut self, field: impl Into<String>, callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let callers = callers.into_iter().map(Into::into).collect();
        self.criteria.insert(field.into(), Criterion::Callers { callers });
        self
    }

    pub fn criteria(&self) -> &IndexMap<String, Criterion> {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Whether a record of the given dialect satisfies every criterion.
    pub fn matches(&self, record: &VariantRecord, dialect: Dialect, registry: &HandlerRegistry) -> bool {
        if self.criteria.is_empty() {
            return true;
        }
        let primary = registry.primary_sample(record, dialect);

        self.criteria.iter().all(|(field, criterion)| match criterion {
            Criterion::Callers { callers } => {
                let supporting = registry.callers(record, dialect);
                callers.iter().any(|c| supporting.contains(c))
            }
            _ => criterion.matches_text(record.field_value(field, primary).as_deref()),
        })
    }
}

/// Offset/limit slice of a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub offset: usize,
    /// `None` means no limit.
    pub limit: Option<usize>,
}

impl Window {
    /// Every result.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Window following this one, with the same limit.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit.unwrap_or(0),
            limit: self.limit,
        }
    }
}
