use thiserror::Error;
use vigil_core::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("label encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot prepare ledger directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable value: {0}")]
    Decode(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Decode(msg) => StoreError::Corrupt(msg),
            LedgerError::Json(e) => StoreError::Corrupt(e.to_string()),
            LedgerError::Sqlite(e @ rusqlite::Error::FromSqlConversionFailure(..)) => {
                StoreError::Corrupt(e.to_string())
            }
            other => StoreError::backend(other),
        }
    }
}
