use crate::config::ConfigError;
use crate::flowsheet::GridError;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FlowsheetError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type FlowsheetResult<T> = Result<T, FlowsheetError>;
