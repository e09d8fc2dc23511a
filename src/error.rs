use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database not initialized. Run 'jobtrack init' first.")]
    NotInitialized,
    #[error("SQLite error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    pub fn company_not_found(id: i64) -> Self {
        TrackerError::NotFound { entity: "Company", id }
    }

    pub fn application_not_found(id: i64) -> Self {
        TrackerError::NotFound { entity: "Application", id }
    }
}
