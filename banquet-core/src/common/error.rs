use thiserror::Error;

#[derive(Error, Debug)]
pub enum BanquetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Blob storage error: {message}")]
    Blob { message: String },

    #[error("Password hashing failed: {message}")]
    Password { message: String },

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),
}

impl BanquetError {
    pub(crate) fn database(context: &str, err: impl std::fmt::Display) -> Self {
        BanquetError::Database {
            message: format!("{context}: {err}"),
        }
    }
}

impl From<libsql::Error> for BanquetError {
    fn from(err: libsql::Error) -> Self {
        BanquetError::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BanquetError>;
