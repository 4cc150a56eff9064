use thiserror::Error;

/// Error taxonomy for the scheduler core. Kinds map directly onto the
/// HTTP status codes the API layer returns (see `scheduler-api::http::error`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Scheduling conflict: {0}")]
    SchedulingConflict(String),

    #[error("Internal invariant violated: {0}")]
    Fatal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => Error::AlreadyExists(db_err.message().to_string()),
                    // PostgreSQL foreign_key_violation
                    "23503" => Error::NotFound("referenced resource not found".to_string()),
                    // PostgreSQL check_violation / not_null_violation
                    "23514" | "23502" => {
                        Error::InvalidArgument("constraint check failed".to_string())
                    }
                    _ => Error::Database(err),
                }
            }
            _ => Error::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
