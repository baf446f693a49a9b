use audioshelf_core::LoadError;
use thiserror::Error;

/// Failures talking to the catalog service. None of these are retried
/// automatically.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached or the request timed out.
    #[error("catalog service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with something that does not match the contract.
    #[error("malformed response from catalog service: {0}")]
    BadResponse(String),

    #[error("catalog service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::BadResponse(err.to_string())
        } else {
            ClientError::Unreachable(err.to_string())
        }
    }
}

impl From<ClientError> for LoadError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable(msg) | ClientError::Config(msg) => LoadError::Unreachable(msg),
            ClientError::BadResponse(msg) => LoadError::BadResponse(msg),
            ClientError::Api { status, message } => LoadError::Api { status, message },
        }
    }
}

impl From<LoadError> for ClientError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Unreachable(msg) => ClientError::Unreachable(msg),
            LoadError::BadResponse(msg) => ClientError::BadResponse(msg),
            LoadError::Api { status, message } => ClientError::Api { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
