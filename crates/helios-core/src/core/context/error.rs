use super::data::DataType;
use super::{ObjectId, Uuid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("UUID {0} does not exist in the context")]
    UuidNotFound(Uuid),

    #[error("Object ID {0} does not exist in the context")]
    ObjectNotFound(ObjectId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Primitive data '{label}' does not exist for UUID {uuid}")]
    PrimitiveDataNotFound { uuid: Uuid, label: String },

    #[error("Object data '{label}' does not exist for object {object_id}")]
    ObjectDataNotFound { object_id: ObjectId, label: String },

    #[error("Global data '{label}' does not exist")]
    GlobalDataNotFound { label: String },

    #[error("Data '{label}' is of type {actual}, but type {requested} was requested")]
    DataTypeMismatch {
        label: String,
        requested: DataType,
        actual: DataType,
    },

    #[error("Timeseries variable '{0}' does not exist")]
    TimeseriesNotFound(String),

    #[error("Primitive {uuid} is not a {expected}")]
    WrongPrimitiveType { uuid: Uuid, expected: &'static str },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}' (line {line}): {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Unable to allocate storage for {0} primitives")]
    Allocation(usize),
}

impl ContextError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ContextError::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
