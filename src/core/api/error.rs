use thiserror::Error;

/// Every failure the transport can produce. The `Display` output is the
/// message shown to the user, so variants never wrap foreign error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read.
    #[error("{0}")]
    Network(String),

    /// A 2xx response whose body does not follow the `{ok, ...}` envelope.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The gateway answered `ok: false` or with a non-2xx status.
    #[error("{message}")]
    Application { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
