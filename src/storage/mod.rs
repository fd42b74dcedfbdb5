//! Flowsheet entry storage
//!
//! Keeps charted entries in memory and hands them to the grid as grouped
//! observations:
//! - entry create / update / soft delete
//! - time-window queries per patient and flowsheet group
//! - the `FlowsheetSource` seam the request handler fetches through

mod source;
pub use source::{FetchResult, FlowsheetSource};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::flowsheet::{groups, templates};
use crate::flowsheet::timestamp::parse_timestamp;
use crate::flowsheet::{GridError, GroupedObservations, Observation};

pub const DEFAULT_SECTION: &str = "General";
pub const DEFAULT_WINDOW_HOURS: i64 = 72;

/// Key format used when an entry becomes a grid observation. Seconds are
/// kept so entries charted within the same minute stay in separate columns.
const OBSERVATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("entry {0} not found")]
    NotFound(u64),
    #[error("invalid entry time: {0}")]
    Timestamp(#[from] GridError),
    #[error("entry store lock poisoned")]
    Poisoned,
    #[error("failed to read seed file {path}: {source}", path = path.display())]
    SeedRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file: {0}")]
    SeedParse(serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Active,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowsheetEntry {
    pub id: u64,
    pub patient_id: u64,
    pub encounter_id: Option<u64>,
    pub flowsheet_group: Option<String>,
    pub section: String,
    pub row_name: String,
    pub value: String,
    pub numeric_value: Option<f64>,
    pub entry_datetime: NaiveDateTime,
    pub documented_by: String,
    pub comments: Option<String>,
    pub status: EntryStatus,
    pub deleted_by: Option<String>,
    pub deleted_date: Option<NaiveDateTime>,
}

impl FlowsheetEntry {
    pub fn is_deleted(&self) -> bool {
        self.status == EntryStatus::Deleted
    }

    pub fn to_observation(&self) -> Observation {
        Observation {
            section: self.section.clone(),
            row: self.row_name.clone(),
            timestamp: self.entry_datetime.format(OBSERVATION_TIME_FORMAT).to_string(),
            value: self.value.clone(),
            entry_id: Some(self.id),
            documented_by: Some(self.documented_by.clone()),
        }
    }
}

/// Request body for charting a new entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    pub patient_id: u64,
    #[serde(default)]
    pub encounter_id: Option<u64>,
    #[serde(default)]
    pub flowsheet_group: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    pub row_name: String,
    pub value: String,
    #[serde(default)]
    pub numeric_value: Option<f64>,
    /// Charted time; the current time when absent.
    #[serde(default)]
    pub entry_datetime: Option<String>,
    pub documented_by: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryUpdate {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub numeric_value: Option<f64>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    pub group: Option<String>,
    pub section: Option<String>,
    pub hours: i64,
}

impl Default for EntryQuery {
    fn default() -> Self {
        EntryQuery {
            group: None,
            section: None,
            hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

impl EntryQuery {
    /// Earliest charted time inside the window; `None` when the window
    /// reaches past the representable range.
    fn window_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        Duration::try_hours(self.hours).and_then(|d| now.checked_sub_signed(d))
    }

    fn matches(&self, entry: &FlowsheetEntry, now: NaiveDateTime) -> bool {
        if entry.is_deleted() {
            return false;
        }
        if let Some(start) = self.window_start(now) {
            if entry.entry_datetime < start {
                return false;
            }
        }
        if let Some(section) = &self.section {
            if entry.section != *section {
                return false;
            }
        }
        match &self.group {
            None => true,
            Some(group) => {
                let charted = entry.flowsheet_group.as_deref();
                match groups::find(group) {
                    Some(known) => charted == Some(known.name) || charted == Some(known.id),
                    None => charted == Some(group.as_str()),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    entries: BTreeMap<u64, FlowsheetEntry>,
}

impl StoreInner {
    fn insert(&mut self, mut entry: FlowsheetEntry) -> FlowsheetEntry {
        self.next_id += 1;
        entry.id = self.next_id;
        self.entries.insert(entry.id, entry.clone());
        entry
    }
}

/// Validate a new entry and resolve its defaults. The id is assigned on insert.
fn prepare(new: NewEntry, now: NaiveDateTime) -> Result<FlowsheetEntry, StoreError> {
    if new.row_name.trim().is_empty() {
        return Err(StoreError::InvalidInput("row_name cannot be empty".into()));
    }
    if new.documented_by.trim().is_empty() {
        return Err(StoreError::InvalidInput("documented_by cannot be empty".into()));
    }

    // Offset times are stored as local wall-clock time.
    let entry_datetime = match new.entry_datetime.as_deref() {
        Some(raw) => parse_timestamp(raw)?.to_local(),
        None => now,
    };
    let section = new
        .section
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string());

    Ok(FlowsheetEntry {
        id: 0,
        patient_id: new.patient_id,
        encounter_id: new.encounter_id,
        flowsheet_group: new.flowsheet_group,
        section,
        row_name: new.row_name,
        value: new.value,
        numeric_value: new.numeric_value,
        entry_datetime,
        documented_by: new.documented_by,
        comments: new.comments,
        status: EntryStatus::Active,
        deleted_by: None,
        deleted_date: None,
    })
}

#[derive(Debug, Default)]
pub struct EntryStore {
    inner: RwLock<StoreInner>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, new: NewEntry, now: NaiveDateTime) -> Result<FlowsheetEntry, StoreError> {
        let entry = prepare(new, now)?;
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let entry = inner.insert(entry);

        debug!(id = entry.id, patient_id = entry.patient_id, row = %entry.row_name, "created flowsheet entry");
        Ok(entry)
    }

    pub fn update(&self, id: u64, update: EntryUpdate) -> Result<FlowsheetEntry, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let entry = inner
            .entries
            .get_mut(&id)
            .filter(|e| !e.is_deleted())
            .ok_or(StoreError::NotFound(id))?;

        if let Some(value) = update.value {
            entry.value = value;
        }
        if let Some(numeric) = update.numeric_value {
            entry.numeric_value = Some(numeric);
        }
        if let Some(comments) = update.comments {
            entry.comments = Some(comments);
        }
        entry.status = EntryStatus::Modified;

        Ok(entry.clone())
    }

    /// Soft delete; the entry stays in the store but drops out of every query.
    pub fn delete(
        &self,
        id: u64,
        deleted_by: Option<String>,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let entry = inner
            .entries
            .get_mut(&id)
            .filter(|e| !e.is_deleted())
            .ok_or(StoreError::NotFound(id))?;

        entry.status = EntryStatus::Deleted;
        entry.deleted_by = deleted_by;
        entry.deleted_date = Some(now);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<FlowsheetEntry, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        inner.entries.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Entries in the query window, newest first.
    pub fn list(
        &self,
        patient_id: u64,
        query: &EntryQuery,
        now: NaiveDateTime,
    ) -> Result<Vec<FlowsheetEntry>, StoreError> {
        let mut entries = self.matching(patient_id, query, now)?;
        entries.sort_by(|a, b| b.entry_datetime.cmp(&a.entry_datetime));
        Ok(entries)
    }

    /// Entries in the query window grouped by section and row.
    ///
    /// For a known group, its template rows come first in display order, even
    /// with nothing charted against them, and sections follow the catalog.
    /// Other rows appear in the order they were first charted.
    pub fn grouped(
        &self,
        patient_id: u64,
        query: &EntryQuery,
        now: NaiveDateTime,
    ) -> Result<GroupedObservations, StoreError> {
        let mut entries = self.matching(patient_id, query, now)?;
        entries.sort_by_key(|e| (e.entry_datetime, e.id));

        let group = query.group.as_deref().and_then(groups::find);
        let mut grouped = GroupedObservations::new();
        if let Some(group) = group {
            templates::for_group(group)
                .into_iter()
                .filter(|t| query.section.as_deref().map_or(true, |s| s == t.section))
                .for_each(|t| grouped.ensure_row(t.section, t.name));
        }
        for entry in &entries {
            grouped.push(entry.to_observation());
        }
        if let Some(group) = group {
            grouped.arrange_sections(group.sections);
        }
        Ok(grouped)
    }

    /// Load entries from a JSON array of `NewEntry`.
    ///
    /// Every entry is validated before any is stored; one bad entry leaves
    /// the store untouched.
    pub fn load_seed(&self, path: &Path, now: NaiveDateTime) -> Result<usize, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::SeedRead {
            path: path.to_path_buf(),
            source,
        })?;
        let seed: Vec<NewEntry> = serde_json::from_str(&raw).map_err(StoreError::SeedParse)?;
        let prepared = seed
            .into_iter()
            .enumerate()
            .map(|(index, new)| {
                prepare(new, now).map_err(|e| {
                    warn!(index, error = %e, "rejected seed entry");
                    e
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = prepared.len();
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        for entry in prepared {
            inner.insert(entry);
        }
        info!(count, path = %path.display(), "loaded flowsheet seed entries");
        Ok(count)
    }

    fn matching(
        &self,
        patient_id: u64,
        query: &EntryQuery,
        now: NaiveDateTime,
    ) -> Result<Vec<FlowsheetEntry>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner
            .entries
            .values()
            .filter(|e| e.patient_id == patient_id && query.matches(e, now))
            .cloned()
            .collect())
    }
}
