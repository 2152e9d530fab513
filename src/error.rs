use std::path::PathBuf;

/// Errors raised by sort and merge operations.
///
/// Public operations return [anyhow::Error]; these values can be recovered with
/// `error.downcast_ref::<CsvError>()`.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// A file or directory could not be found.
    #[error("Cannot find path: {}", path.display())]
    Path {
        path: PathBuf,
    },
    /// An invalid parameter or an invalid combination of parameters.
    #[error("Invalid parameter: {0}")]
    Parameter(String),
    /// The merged file has columns that do not appear in the main one.
    #[error("Some columns of the merged file do not appear in the main one: {missing:?}")]
    Schema {
        missing: Vec<String>,
    },
    /// A row does not have the shape expected by its context.
    #[error("Malformed row: {0}")]
    Format(String),
}

impl CsvError {
    pub(crate) fn path(path: impl Into<PathBuf>) -> CsvError {
        CsvError::Path { path: path.into() }
    }

    pub(crate) fn parameter(message: impl Into<String>) -> CsvError {
        CsvError::Parameter(message.into())
    }

    pub(crate) fn format(message: impl Into<String>) -> CsvError {
        CsvError::Format(message.into())
    }
}
