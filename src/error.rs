use std::io;
use std::path::Path;

use thiserror::Error;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Every failure a handler can report. The `Display` text is what ends up in
/// the `error` field of the wire response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    SizeLimitExceeded(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Invalid request format: {0}")]
    MalformedRequest(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("{0:#}")]
    External(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn path_denied(path: &str) -> Self {
        Self::AccessDenied(format!("Path '{path}' is not in allowed directories"))
    }

    pub fn pair_denied() -> Self {
        Self::AccessDenied("One or both paths are not in allowed directories".to_string())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::External(anyhow::anyhow!(message.into()))
    }

    /// Short machine-friendly name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::SizeLimitExceeded(_) => "size_limit_exceeded",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::MalformedRequest(_) => "malformed_request",
            Self::UnknownAction(_) => "unknown_action",
            Self::External(_) => "external",
        }
    }
}

/// Map an io error for `path`, keeping `NotFound` distinguishable.
pub fn io_err(path: &Path) -> impl FnOnce(io::Error) -> GatewayError + '_ {
    move |err| match err.kind() {
        io::ErrorKind::NotFound => {
            GatewayError::NotFound(format!("No such file or directory: '{}'", path.display()))
        }
        _ => GatewayError::External(anyhow::Error::new(err).context(format!("{}", path.display()))),
    }
}
