use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("METHOD_NOT_ALLOWED: {0}")]
    MethodNotAllowed(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Message without the taxonomy prefix, suitable for response bodies.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::MethodNotAllowed(message)
            | Self::Io(message)
            | Self::Internal(message) => message,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<tempfile::PersistError> for AppError {
    fn from(value: tempfile::PersistError) -> Self {
        Self::Io(value.error.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::Validation("bad id".to_string()).status_code(), 400);
        assert_eq!(AppError::NotFound("missing".to_string()).status_code(), 404);
        assert_eq!(AppError::MethodNotAllowed("PATCH".to_string()).status_code(), 405);
        assert_eq!(AppError::Io("disk".to_string()).status_code(), 500);
        assert_eq!(AppError::Internal("corrupt".to_string()).status_code(), 500);
    }

    #[test]
    fn message_strips_prefix() {
        let error = AppError::NotFound("Todo 7 not found".to_string());
        assert_eq!(error.to_string(), "NOT_FOUND: Todo 7 not found");
        assert_eq!(error.message(), "Todo 7 not found");
    }
}
