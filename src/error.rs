use thiserror::Error;

/// Failures reported by the pipeline. Every variant is scoped to a single
/// call; a failing call never leaves a [`Table`](crate::data::model::Table)
/// half-modified.
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be read or parsed as a table at all.
    #[error("failed to load dataset: {0}")]
    Load(String),

    /// A requested column is absent from the schema.
    #[error("column not found: '{0}'")]
    ColumnNotFound(String),

    /// Too few usable rows or points for the requested computation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A parameter is outside its accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Load(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Load(e.to_string())
    }
}
