//! Flowsheet: time-columned grids over charted clinical observations
//!
//! Entries charted against a patient are grouped by section and row, then
//! pivoted into a dense grid whose columns are the distinct charting times.

pub mod api;
pub mod config;
pub mod error;
pub mod flowsheet;
pub mod storage;

pub use error::{FlowsheetError, FlowsheetResult};
pub use flowsheet::{
    Cell, FlowsheetGrid, FlowsheetGridBuilder, GridColumn, GridError, GridRow, GroupedObservations,
    Observation,
};
