//! Signals carried by the event bus.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{Predicate, RecordSet};

/// Lifecycle of one report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Discriminant of a [`Signal`], used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    SelectionChanged,
    FilteredRowsChanged,
    RefreshNeeded,
}

impl SignalKind {
    /// Whether the signal is only meaningful once the section is ready.
    pub fn requires_ready(&self) -> bool {
        !matches!(self, SignalKind::RefreshNeeded)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::SelectionChanged => "selection_changed",
            SignalKind::FilteredRowsChanged => "filtered_rows_changed",
            SignalKind::RefreshNeeded => "refresh_needed",
        };
        f.write_str(name)
    }
}

/// A coordination message between views.
#[derive(Debug, Clone)]
pub enum Signal {
    /// New selection criteria, field name to exact value or range.
    SelectionChanged(Predicate),
    /// The filtered record set changed.
    FilteredRowsChanged { rows: RecordSet, count: usize },
    /// Consumers should re-query.
    RefreshNeeded(String),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::SelectionChanged(_) => SignalKind::SelectionChanged,
            Signal::FilteredRowsChanged { .. } => SignalKind::FilteredRowsChanged,
            Signal::RefreshNeeded(_) => SignalKind::RefreshNeeded,
        }
    }

    /// Build a rows signal from a query result.
    pub fn filtered_rows(rows: RecordSet) -> Self {
        let count = rows.len();
        Signal::FilteredRowsChanged { rows, count }
    }
}
