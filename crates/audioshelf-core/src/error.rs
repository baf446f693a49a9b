use thiserror::Error;

use crate::models::RecordId;

/// All errors that can occur in audioshelf-core.
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Audiobook not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Library not initialized. Run 'audioshelf import' to create the catalog.")]
    LibraryNotInitialized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    ProtocolError = 5,
    NetworkError = 6,
    Conflict = 7,
    ConfirmRequired = 8,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
