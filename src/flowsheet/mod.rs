//! Flowsheet types and the grid pivot
//!
//! A flowsheet groups repeated clinical observations by section (e.g. "Vitals")
//! and row (e.g. "Heart Rate"). This module holds:
//! - the grouped observation model handed over by data access
//! - timestamp parsing for charted entries
//! - the grid builder that turns sparse entries into time-aligned columns
//! - the catalog of predefined flowsheet groups

pub mod grid;
pub mod groups;
pub mod templates;
pub mod timestamp;

pub use grid::{Cell, FlowsheetGrid, FlowsheetGridBuilder, GridColumn, GridRow};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("malformed timestamp: {raw:?}")]
    MalformedTimestamp { raw: String },
    #[error("empty section label")]
    EmptySectionLabel,
    #[error("empty row label in section {section:?}")]
    EmptyRowLabel { section: String },
}

/// One charted value for a flowsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub section: String,
    pub row: String,
    pub timestamp: String, // As charted; parsed when the grid is built
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documented_by: Option<String>,
}

impl Observation {
    pub fn new(
        section: impl Into<String>,
        row: impl Into<String>,
        timestamp: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Observation {
            section: section.into(),
            row: row.into(),
            timestamp: timestamp.into(),
            value: value.into(),
            entry_id: None,
            documented_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowObservations {
    pub name: String,
    pub entries: Vec<Observation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionObservations {
    pub name: String,
    pub rows: Vec<RowObservations>,
}

impl SectionObservations {
    fn row_mut(&mut self, name: &str) -> &mut RowObservations {
        let idx = match self.rows.iter().position(|r| r.name == name) {
            Some(idx) => idx,
            None => {
                self.rows.push(RowObservations {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx]
    }
}

/// Observations grouped section -> row, in presentation order.
///
/// Order is first-seen order, never alphabetical. Labels are matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedObservations {
    sections: Vec<SectionObservations>,
}

impl GroupedObservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: Vec<SectionObservations>) -> Self {
        GroupedObservations { sections }
    }

    pub fn sections(&self) -> &[SectionObservations] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn observation_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.rows.iter())
            .map(|r| r.entries.len())
            .sum()
    }

    /// Append an observation under its own section and row labels.
    pub fn push(&mut self, observation: Observation) {
        let section = observation.section.clone();
        let row = observation.row.clone();
        self.section_mut(&section).row_mut(&row).entries.push(observation);
    }

    /// Register a row that has nothing charted yet.
    pub fn ensure_row(&mut self, section: &str, row: &str) {
        self.section_mut(section).row_mut(row);
    }

    /// Reorder sections to follow `order`; sections not listed keep their
    /// relative order after the listed ones.
    pub fn arrange_sections(&mut self, order: &[&str]) {
        self.sections.sort_by_key(|s| {
            order
                .iter()
                .position(|name| *name == s.name)
                .unwrap_or(order.len())
        });
    }

    fn section_mut(&mut self, name: &str) -> &mut SectionObservations {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(SectionObservations {
                    name: name.to_string(),
                    rows: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }
}

impl FromIterator<Observation> for GroupedObservations {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        let mut grouped = GroupedObservations::new();
        for observation in iter {
            grouped.push(observation);
        }
        grouped
    }
}
