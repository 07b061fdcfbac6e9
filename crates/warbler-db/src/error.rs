use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

/// Errors surfaced by the database layer.
///
/// Constraint violations are split the way callers care about them:
/// `Integrity` for NOT NULL, UNIQUE, PRIMARY KEY and FOREIGN KEY failures,
/// `Data` for values the column cannot hold (the schema's CHECK length
/// limits).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("DB lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, DbError::Integrity(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, DbError::Data(_))
    }
}

enum Violation {
    Integrity(String),
    Data(String),
}

fn classify(e: &rusqlite::Error) -> Option<Violation> {
    let rusqlite::Error::SqliteFailure(err, msg) = e else {
        return None;
    };
    if err.code != ErrorCode::ConstraintViolation {
        return None;
    }

    let detail = msg.clone().unwrap_or_else(|| err.to_string());
    if err.extended_code == ffi::SQLITE_CONSTRAINT_CHECK {
        Some(Violation::Data(detail))
    } else {
        Some(Violation::Integrity(detail))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match classify(&e) {
            Some(Violation::Integrity(detail)) => DbError::Integrity(detail),
            Some(Violation::Data(detail)) => DbError::Data(detail),
            None => DbError::Sqlite(e),
        }
    }
}
