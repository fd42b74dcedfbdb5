use chrono::NaiveDateTime;
use tracing::warn;

use super::{EntryQuery, EntryStore};
use crate::flowsheet::GroupedObservations;

/// Outcome of fetching a patient's flowsheet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success(GroupedObservations),
    Failure { reason: String },
}

/// Where the request handler gets grouped observations from.
pub trait FlowsheetSource: Send + Sync {
    fn fetch(&self, patient_id: u64, query: &EntryQuery, now: NaiveDateTime) -> FetchResult;
}

impl FlowsheetSource for EntryStore {
    fn fetch(&self, patient_id: u64, query: &EntryQuery, now: NaiveDateTime) -> FetchResult {
        match self.grouped(patient_id, query, now) {
            Ok(grouped) => FetchResult::Success(grouped),
            Err(e) => {
                warn!(patient_id, error = %e, "flowsheet fetch failed");
                FetchResult::Failure {
                    reason: e.to_string(),
                }
            }
        }
    }
}
