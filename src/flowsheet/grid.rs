use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::timestamp::{date_label, parse_timestamp, time_label};
use super::{GridError, GroupedObservations, Observation};

/// A time column in the flowsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridColumn {
    pub timestamp: NaiveDateTime,
    pub date_label: String,
    pub time_label: String,
}

impl GridColumn {
    fn new(timestamp: NaiveDateTime) -> Self {
        GridColumn {
            date_label: date_label(&timestamp),
            time_label: time_label(&timestamp),
            timestamp,
        }
    }
}

/// A grid cell: either a charted value (read-only) or an open slot for entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Cell {
    Filled(Observation),
    Empty,
}

impl Cell {
    pub fn is_editable(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn observation(&self) -> Option<&Observation> {
        match self {
            Cell::Filled(observation) => Some(observation),
            Cell::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRow {
    pub section: String,
    pub row: String,
    /// First row of its section; renderers put the section header above it.
    pub starts_section: bool,
    pub cells: Vec<Cell>,
}

/// Dense, time-columned view over grouped observations.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowsheetGrid {
    pub columns: Vec<GridColumn>,
    pub rows: Vec<GridRow>,
    /// Column times are UTC; set when the input timestamps carried offsets.
    #[serde(default)]
    pub utc: bool,
}

impl FlowsheetGrid {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn filled_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .filter(|c| !c.is_editable())
            .count()
    }
}

pub struct FlowsheetGridBuilder;

impl FlowsheetGridBuilder {
    /// Pivot grouped observations into a grid.
    ///
    /// Columns are the distinct entry timestamps, ascending. Sections and rows
    /// keep input order. When a row has two entries at the same instant the
    /// first one in input order is kept.
    ///
    /// Timestamps with a UTC offset are compared as instants. Fails without
    /// producing a partial grid when a label is blank, a timestamp does not
    /// parse, or offset and naive timestamps are mixed.
    pub fn build(observations: &GroupedObservations) -> Result<FlowsheetGrid, GridError> {
        // Validate and parse everything before producing any output.
        let mut parsed = Vec::with_capacity(observations.sections().len());
        let mut instants = BTreeSet::new();
        let mut offset_mode: Option<bool> = None;

        for section in observations.sections() {
            if section.name.trim().is_empty() {
                return Err(GridError::EmptySectionLabel);
            }

            let mut rows = Vec::with_capacity(section.rows.len());
            for row in &section.rows {
                if row.name.trim().is_empty() {
                    return Err(GridError::EmptyRowLabel {
                        section: section.name.clone(),
                    });
                }

                let mut entries = Vec::with_capacity(row.entries.len());
                for entry in &row.entries {
                    let charted = parse_timestamp(&entry.timestamp)?;
                    match offset_mode {
                        None => offset_mode = Some(charted.has_offset()),
                        Some(mode) if mode != charted.has_offset() => {
                            warn!(timestamp = %entry.timestamp, "offset and naive timestamps mixed");
                            return Err(GridError::MalformedTimestamp {
                                raw: entry.timestamp.clone(),
                            });
                        }
                        Some(_) => {}
                    }
                    instants.insert(charted.instant());
                    entries.push((charted.instant(), entry));
                }
                rows.push((row.name.as_str(), entries));
            }
            parsed.push((section.name.as_str(), rows));
        }

        let instants: Vec<NaiveDateTime> = instants.into_iter().collect();
        let mut grid_rows = Vec::new();
        let mut dropped = 0usize;

        for (section, rows) in parsed {
            for (i, (row, entries)) in rows.into_iter().enumerate() {
                let mut cells = vec![Cell::Empty; instants.len()];

                for (ts, entry) in entries {
                    // Every parsed instant was collected above.
                    let Ok(idx) = instants.binary_search(&ts) else {
                        continue;
                    };
                    if cells[idx].is_editable() {
                        cells[idx] = Cell::Filled(entry.clone());
                    } else {
                        dropped += 1;
                        warn!(
                            section,
                            row,
                            timestamp = %entry.timestamp,
                            "duplicate flowsheet entry at same time, keeping first"
                        );
                    }
                }

                grid_rows.push(GridRow {
                    section: section.to_string(),
                    row: row.to_string(),
                    starts_section: i == 0,
                    cells,
                });
            }
        }

        debug!(
            columns = instants.len(),
            rows = grid_rows.len(),
            dropped,
            "built flowsheet grid"
        );

        Ok(FlowsheetGrid {
            columns: instants.into_iter().map(GridColumn::new).collect(),
            rows: grid_rows,
            utc: offset_mode.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowsheet::SectionObservations;
    use crate::flowsheet::RowObservations;
    use pretty_assertions::assert_eq;

    fn obs(section: &str, row: &str, ts: &str, value: &str) -> Observation {
        Observation::new(section, row, ts, value)
    }

    fn values(row: &GridRow) -> Vec<Option<&str>> {
        row.cells
            .iter()
            .map(|c| c.observation().map(|o| o.value.as_str()))
            .collect()
    }

    fn column_keys(grid: &FlowsheetGrid) -> Vec<String> {
        grid.columns
            .iter()
            .map(|c| c.timestamp.format("%Y-%m-%dT%H:%M").to_string())
            .collect()
    }

    fn sample() -> GroupedObservations {
        vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00", "88"),
            obs("Vitals", "Heart Rate", "2024-01-01T04:00", "84"),
            obs("Vitals", "Temp", "2024-01-01T05:00", "37.1"),
            obs("Assessment", "Pain Score", "2024-01-01T04:00", "3"),
            obs("Assessment", "Sedation", "2024-01-02T00:00", "RASS 0"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_input_gives_empty_grid() {
        let grid = FlowsheetGridBuilder::build(&GroupedObservations::new()).unwrap();
        assert!(grid.columns.is_empty());
        assert!(grid.rows.is_empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn reorders_newest_first_entries() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00", "88"),
            obs("Vitals", "Heart Rate", "2024-01-01T04:00", "84"),
        ]
        .into_iter()
        .collect();

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();

        assert_eq!(column_keys(&grid), vec!["2024-01-01T04:00", "2024-01-01T06:00"]);
        assert_eq!(grid.rows.len(), 1);
        assert_eq!(grid.rows[0].row, "Heart Rate");
        assert_eq!(values(&grid.rows[0]), vec![Some("84"), Some("88")]);
    }

    #[test]
    fn columns_are_distinct_and_ascending() {
        let grid = FlowsheetGridBuilder::build(&sample()).unwrap();

        assert_eq!(
            column_keys(&grid),
            vec![
                "2024-01-01T04:00",
                "2024-01-01T05:00",
                "2024-01-01T06:00",
                "2024-01-02T00:00",
            ]
        );
        assert!(grid.columns.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(grid.columns[3].date_label, "1/2/24");
        assert_eq!(grid.columns[3].time_label, "0000");
    }

    #[test]
    fn every_row_is_dense() {
        let grid = FlowsheetGridBuilder::build(&sample()).unwrap();
        for row in &grid.rows {
            assert_eq!(row.cells.len(), grid.columns.len(), "row {}", row.row);
        }
        assert_eq!(values(&grid.rows[1]), vec![None, Some("37.1"), None, None]);
    }

    #[test]
    fn keeps_input_order_of_sections_and_rows() {
        let grid = FlowsheetGridBuilder::build(&sample()).unwrap();
        let layout: Vec<_> = grid
            .rows
            .iter()
            .map(|r| (r.section.as_str(), r.row.as_str(), r.starts_section))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("Vitals", "Heart Rate", true),
                ("Vitals", "Temp", false),
                ("Assessment", "Pain Score", true),
                ("Assessment", "Sedation", false),
            ]
        );
    }

    #[test]
    fn every_observation_lands_in_one_cell() {
        let input = sample();
        let grid = FlowsheetGridBuilder::build(&input).unwrap();

        assert_eq!(grid.filled_count(), input.observation_count());
        for section in input.sections() {
            for row in &section.rows {
                for entry in &row.entries {
                    let hits = grid
                        .rows
                        .iter()
                        .flat_map(|r| r.cells.iter())
                        .filter(|c| c.observation() == Some(entry))
                        .count();
                    assert_eq!(hits, 1, "{entry:?}");
                }
            }
        }
    }

    #[test]
    fn row_without_entries_gets_empty_cells() {
        let mut grouped = sample();
        grouped.ensure_row("Vitals", "SpO2");

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();
        let spo2 = grid.rows.iter().find(|r| r.row == "SpO2").unwrap();

        assert_eq!(spo2.cells.len(), 4);
        assert!(spo2.cells.iter().all(Cell::is_editable));
    }

    #[test]
    fn first_duplicate_wins() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00", "first"),
            obs("Vitals", "Heart Rate", "2024-01-01 06:00", "second"),
        ]
        .into_iter()
        .collect();

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();

        assert_eq!(grid.columns.len(), 1);
        assert_eq!(values(&grid.rows[0]), vec![Some("first")]);
    }

    #[test]
    fn equivalent_formats_share_a_column() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "01/01/2024 06:00", "88"),
            obs("Vitals", "Temp", "2024-01-01T06:00:00", "37.0"),
        ]
        .into_iter()
        .collect();

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();
        assert_eq!(grid.columns.len(), 1);
        assert_eq!(grid.filled_count(), 2);
    }

    #[test]
    fn offset_times_in_one_row_stay_apart() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00:00-05:00", "88"),
            obs("Vitals", "Heart Rate", "2024-01-01T06:00:00+00:00", "92"),
        ]
        .into_iter()
        .collect();

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();

        assert!(grid.utc);
        assert_eq!(column_keys(&grid), vec!["2024-01-01T06:00", "2024-01-01T11:00"]);
        assert_eq!(values(&grid.rows[0]), vec![Some("92"), Some("88")]);
        assert_eq!(grid.filled_count(), 2);
    }

    #[test]
    fn same_instant_with_different_offsets_shares_a_column() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00:00-05:00", "88"),
            obs("Vitals", "Temp", "2024-01-01T11:00:00Z", "37.0"),
        ]
        .into_iter()
        .collect();

        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();

        assert_eq!(column_keys(&grid), vec!["2024-01-01T11:00"]);
        assert_eq!(values(&grid.rows[0]), vec![Some("88")]);
        assert_eq!(values(&grid.rows[1]), vec![Some("37.0")]);
    }

    #[test]
    fn mixing_offset_and_naive_times_is_rejected() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00", "88"),
            obs("Vitals", "Temp", "2024-01-01T07:00:00Z", "37.0"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            FlowsheetGridBuilder::build(&grouped),
            Err(GridError::MalformedTimestamp {
                raw: "2024-01-01T07:00:00Z".to_string()
            })
        );
    }

    #[test]
    fn build_is_deterministic() {
        let input = sample();
        assert_eq!(
            FlowsheetGridBuilder::build(&input).unwrap(),
            FlowsheetGridBuilder::build(&input).unwrap()
        );
    }

    #[test]
    fn malformed_timestamp_aborts() {
        let mut grouped = sample();
        grouped.push(obs("Vitals", "Temp", "around noon", "37.4"));

        assert_eq!(
            FlowsheetGridBuilder::build(&grouped),
            Err(GridError::MalformedTimestamp {
                raw: "around noon".to_string()
            })
        );
    }

    #[test]
    fn blank_labels_are_rejected() {
        let blank_section = GroupedObservations::from_sections(vec![SectionObservations {
            name: "  ".to_string(),
            rows: vec![],
        }]);
        assert_eq!(
            FlowsheetGridBuilder::build(&blank_section),
            Err(GridError::EmptySectionLabel)
        );

        let blank_row = GroupedObservations::from_sections(vec![SectionObservations {
            name: "Vitals".to_string(),
            rows: vec![RowObservations {
                name: String::new(),
                entries: vec![obs("Vitals", "", "2024-01-01T06:00", "88")],
            }],
        }]);
        assert_eq!(
            FlowsheetGridBuilder::build(&blank_row),
            Err(GridError::EmptyRowLabel {
                section: "Vitals".to_string()
            })
        );
    }

    #[test]
    fn cells_serialize_with_state_tag() {
        let grouped: GroupedObservations = vec![
            obs("Vitals", "Heart Rate", "2024-01-01T06:00", "88"),
            obs("Vitals", "Temp", "2024-01-01T07:00", "37.0"),
        ]
        .into_iter()
        .collect();
        let grid = FlowsheetGridBuilder::build(&grouped).unwrap();

        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json["rows"][0]["cells"][0]["state"], "filled");
        assert_eq!(json["rows"][0]["cells"][0]["value"], "88");
        assert_eq!(json["rows"][0]["cells"][1]["state"], "empty");
        assert_eq!(json["columns"][1]["time_label"], "0700");
    }
}
