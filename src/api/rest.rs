use std::convert::Infallible;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::api::view::{load_flowsheet, FlowsheetRequest};
use crate::config::FlowsheetConfig;
use crate::error::{FlowsheetError, FlowsheetResult};
use crate::flowsheet::groups;
use crate::flowsheet::templates::{self, TemplateFilter};
use crate::storage::{EntryQuery, EntryStore, EntryUpdate, NewEntry, StoreError};

type Reply = WithStatus<Json>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Query string accepted by the patient flowsheet routes.
#[derive(Debug, Default, Deserialize)]
pub struct FlowsheetParams {
    pub group: Option<String>,
    pub section: Option<String>,
    pub hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateParams {
    pub group: Option<String>,
    pub section: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub deleted_by: Option<String>,
}

pub struct RestApi {
    store: Arc<EntryStore>,
    defaults: FlowsheetConfig,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl RestApi {
    pub fn new(store: Arc<EntryStore>, defaults: FlowsheetConfig) -> Self {
        RestApi {
            store,
            defaults,
            clock: local_now,
        }
    }

    /// Replace the wall clock used for time windows and default entry times.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.get_groups()
            .or(self.get_templates())
            .or(self.list_entries())
            .or(self.get_grouped())
            .or(self.get_grid())
            .or(self.create_entry())
            .or(self.update_entry())
            .or(self.delete_entry())
    }

    fn get_groups(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        warp::path!("flowsheets" / "groups")
            .and(warp::get())
            .map(|| reply(StatusCode::OK, "Flowsheet groups", Some(groups::all())))
    }

    fn get_templates(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        warp::path!("flowsheets" / "templates")
            .and(warp::get())
            .and(warp::query::<TemplateParams>())
            .map(|params: TemplateParams| {
                let group = match params.group.as_deref() {
                    Some(key) => match groups::find(key) {
                        Some(group) => Some(group),
                        None => {
                            let error = FlowsheetError::BadRequest(format!("unknown flowsheet group: {key}"));
                            return error_reply(&error);
                        }
                    },
                    None => None,
                };
                let filter = TemplateFilter {
                    group,
                    section: params.section.as_deref(),
                    category: params.category.as_deref(),
                };
                let found = templates::find(&filter);
                reply_with_count(StatusCode::OK, "Flowsheet templates", found.len(), found)
            })
    }

    fn list_entries(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let defaults = self.defaults.clone();
        let clock = self.clock;

        warp::path!("flowsheets" / "patient" / u64)
            .and(warp::get())
            .and(warp::query::<FlowsheetParams>())
            .and_then(move |patient_id: u64, params: FlowsheetParams| {
                let store = Arc::clone(&store);
                let defaults = defaults.clone();
                async move {
                    let result = entry_query(&params, &defaults, false)
                        .and_then(|query| store.list(patient_id, &query, clock()).map_err(FlowsheetError::from));
                    Ok::<Reply, Infallible>(match result {
                        Ok(entries) => {
                            let count = entries.len();
                            reply_with_count(StatusCode::OK, &format!("{count} entries"), count, entries)
                        }
                        Err(e) => error_reply(&e),
                    })
                }
            })
    }

    fn get_grouped(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let defaults = self.defaults.clone();
        let clock = self.clock;

        warp::path!("flowsheets" / "patient" / u64 / "grouped")
            .and(warp::get())
            .and(warp::query::<FlowsheetParams>())
            .and_then(move |patient_id: u64, params: FlowsheetParams| {
                let store = Arc::clone(&store);
                let defaults = defaults.clone();
                async move {
                    let result = entry_query(&params, &defaults, true)
                        .and_then(|query| store.grouped(patient_id, &query, clock()).map_err(FlowsheetError::from));
                    Ok::<Reply, Infallible>(match result {
                        Ok(grouped) => reply(StatusCode::OK, "Grouped flowsheet entries", Some(grouped)),
                        Err(e) => error_reply(&e),
                    })
                }
            })
    }

    fn get_grid(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let defaults = self.defaults.clone();
        let clock = self.clock;

        warp::path!("flowsheets" / "patient" / u64 / "grid")
            .and(warp::get())
            .and(warp::query::<FlowsheetParams>())
            .and_then(move |patient_id: u64, params: FlowsheetParams| {
                let store = Arc::clone(&store);
                let defaults = defaults.clone();
                async move {
                    let result = entry_query(&params, &defaults, true).and_then(|query| {
                        let request = FlowsheetRequest {
                            patient_id,
                            group: query.group.unwrap_or_default(),
                            hours: query.hours,
                            now: clock(),
                        };
                        debug!(?request, "loading flowsheet grid");
                        load_flowsheet(store.as_ref(), &request).map_err(FlowsheetError::from)
                    });
                    Ok::<Reply, Infallible>(match result {
                        Ok(view) => reply(StatusCode::OK, "Flowsheet grid", Some(view)),
                        Err(e) => error_reply(&e),
                    })
                }
            })
    }

    fn create_entry(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let clock = self.clock;

        warp::path!("flowsheets" / "entry")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |new: NewEntry| {
                let store = Arc::clone(&store);
                async move {
                    Ok::<Reply, Infallible>(match store.create(new, clock()) {
                        Ok(entry) => reply(StatusCode::CREATED, "Entry created successfully", Some(entry)),
                        Err(e) => error_reply(&e.into()),
                    })
                }
            })
    }

    fn update_entry(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);

        warp::path!("flowsheets" / "entry" / u64)
            .and(warp::put())
            .and(warp::body::json())
            .and_then(move |id: u64, update: EntryUpdate| {
                let store = Arc::clone(&store);
                async move {
                    Ok::<Reply, Infallible>(match store.update(id, update) {
                        Ok(entry) => reply(StatusCode::OK, "Entry updated successfully", Some(entry)),
                        Err(e) => error_reply(&e.into()),
                    })
                }
            })
    }

    fn delete_entry(&self) -> impl Filter<Extract = (Reply,), Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let clock = self.clock;

        warp::path!("flowsheets" / "entry" / u64)
            .and(warp::delete())
            .and(warp::query::<DeleteParams>())
            .and_then(move |id: u64, params: DeleteParams| {
                let store = Arc::clone(&store);
                async move {
                    Ok::<Reply, Infallible>(match store.delete(id, params.deleted_by, clock()) {
                        Ok(()) => reply::<()>(StatusCode::OK, "Entry deleted successfully", None),
                        Err(e) => error_reply(&e.into()),
                    })
                }
            })
    }
}

/// Resolve query parameters against configured defaults.
fn entry_query(
    params: &FlowsheetParams,
    defaults: &FlowsheetConfig,
    default_group: bool,
) -> FlowsheetResult<EntryQuery> {
    let hours = params.hours.unwrap_or(defaults.default_hours);
    if hours <= 0 {
        return Err(FlowsheetError::BadRequest("hours must be positive".into()));
    }

    let group = match &params.group {
        Some(group) if !group.trim().is_empty() => Some(group.clone()),
        _ if default_group => Some(defaults.default_group.clone()),
        _ => None,
    };

    Ok(EntryQuery {
        group,
        section: params.section.clone(),
        hours,
    })
}

fn reply<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> Reply {
    respond(status, message, data, None)
}

/// Success reply for listings; carries the item count next to `data`.
fn reply_with_count<T: Serialize>(status: StatusCode, message: &str, count: usize, data: T) -> Reply {
    respond(status, message, Some(data), Some(count))
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: Option<T>, count: Option<usize>) -> Reply {
    match data.map(serde_json::to_value).transpose() {
        Ok(data) => {
            let response = ApiResponse {
                status: "success".to_string(),
                message: message.to_string(),
                data,
                count,
            };
            warp::reply::with_status(warp::reply::json(&response), status)
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            let response = ApiResponse {
                status: "error".to_string(),
                message: "Failed to serialize response".to_string(),
                data: None,
                count: None,
            };
            warp::reply::with_status(warp::reply::json(&response), StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_reply(error: &FlowsheetError) -> Reply {
    let status = match error {
        FlowsheetError::Grid(_) | FlowsheetError::BadRequest(_) => StatusCode::BAD_REQUEST,
        FlowsheetError::Store(StoreError::InvalidInput(_) | StoreError::Timestamp(_)) => {
            StatusCode::BAD_REQUEST
        }
        FlowsheetError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        FlowsheetError::Store(_) | FlowsheetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %error, "flowsheet request failed");
    }

    let response = ApiResponse {
        status: "error".to_string(),
        message: error.to_string(),
        data: None,
        count: None,
    };
    warp::reply::with_status(warp::reply::json(&response), status)
}
