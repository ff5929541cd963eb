use avocado_core::CoreError;

/// Failures inside a store transaction. Dropping the transaction on any of
/// these rolls it back.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Core(e) => e,
            StoreError::Db(e) => db_err(e),
        }
    }
}

pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = match db.constraint() {
                Some(c) if c.contains("username") => "Username already exists",
                Some(c) if c.contains("email") => "Email already exists",
                _ => "Record already exists",
            };
            return CoreError::Conflict(what.to_string());
        }
        if db.is_check_violation() {
            tracing::warn!("Check constraint rejected write: {}", db.message());
            return CoreError::Conflict("Request violates a data constraint".to_string());
        }
    }
    tracing::error!("Database error: {}", err);
    CoreError::InternalError(err.to_string())
}
