use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::flowsheet::{FlowsheetGrid, FlowsheetGridBuilder, GridError};
use crate::storage::{EntryQuery, FetchResult, FlowsheetSource};

/// Everything a flowsheet page needs, resolved from the request up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowsheetRequest {
    pub patient_id: u64,
    pub group: String,
    pub hours: i64,
    pub now: NaiveDateTime,
}

/// What the renderer receives: a grid, or the "no data, add a column" prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowsheetView {
    Grid { group: String, grid: FlowsheetGrid },
    NoData { group: String, message: String },
}

impl FlowsheetView {
    fn no_data(group: &str) -> Self {
        FlowsheetView::NoData {
            group: group.to_string(),
            message: format!("No flowsheet data found for this patient in {group}."),
        }
    }
}

pub fn load_flowsheet(
    source: &dyn FlowsheetSource,
    request: &FlowsheetRequest,
) -> Result<FlowsheetView, GridError> {
    let query = EntryQuery {
        group: Some(request.group.clone()),
        section: None,
        hours: request.hours,
    };

    let grouped = match source.fetch(request.patient_id, &query, request.now) {
        FetchResult::Success(grouped) => grouped,
        FetchResult::Failure { reason } => {
            info!(patient_id = request.patient_id, %reason, "flowsheet source failed, showing no data");
            return Ok(FlowsheetView::no_data(&request.group));
        }
    };

    // Template rows alone do not make a flowsheet.
    if grouped.observation_count() == 0 {
        debug!(patient_id = request.patient_id, group = %request.group, "no flowsheet entries");
        return Ok(FlowsheetView::no_data(&request.group));
    }

    let grid = FlowsheetGridBuilder::build(&grouped)?;
    Ok(FlowsheetView::Grid {
        group: request.group.clone(),
        grid,
    })
}
