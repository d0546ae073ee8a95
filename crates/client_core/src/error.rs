use shared::{
    domain::InvalidTransition,
    error::{ApiError, ErrorCode},
    validation::ValidationError,
};
use thiserror::Error;

/// Failures surfaced to dashboards. Views only keep the rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session expired or missing, please sign in again")]
    Unauthorized,
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    ValidationFailed(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("server error: {0}")]
    ServerError(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Maps an HTTP status plus the server's message onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::InvalidTransition(message),
            400 | 422 => Self::ValidationFailed(message),
            502..=504 => Self::ServiceUnavailable(message),
            _ => Self::ServerError(format!("HTTP {status}: {message}")),
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(value: ApiError) -> Self {
        match value.code {
            ErrorCode::InvalidCredentials => Self::InvalidCredentials,
            ErrorCode::Unauthorized => Self::Unauthorized,
            ErrorCode::Forbidden => Self::Forbidden(value.message),
            ErrorCode::NotFound => Self::NotFound(value.message),
            ErrorCode::InvalidTransition => Self::InvalidTransition(value.message),
            ErrorCode::Validation => Self::ValidationFailed(value.message),
            ErrorCode::Internal => Self::ServerError(value.message),
        }
    }
}

impl From<ValidationError> for ClientError {
    fn from(value: ValidationError) -> Self {
        Self::ValidationFailed(value.to_string())
    }
}

impl From<InvalidTransition> for ClientError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidTransition(value.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            Self::ValidationFailed(value.to_string())
        } else if value.is_connect() || value.is_timeout() {
            Self::ServiceUnavailable(value.to_string())
        } else if let Some(status) = value.status() {
            Self::from_status(status.as_u16(), value.to_string())
        } else if value.is_decode() {
            Self::ServerError(format!("unreadable response: {value}"))
        } else {
            Self::ServiceUnavailable(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_by_range() {
        assert_eq!(ClientError::from_status(401, "x"), ClientError::Unauthorized);
        assert_eq!(
            ClientError::from_status(409, "cannot publish"),
            ClientError::InvalidTransition("cannot publish".into())
        );
        assert_eq!(
            ClientError::from_status(422, "bad"),
            ClientError::ValidationFailed("bad".into())
        );
        assert!(matches!(
            ClientError::from_status(503, "down"),
            ClientError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            ClientError::from_status(500, "boom"),
            ClientError::ServerError(_)
        ));
    }

    #[test]
    fn request_build_failures_are_validation_errors() {
        let err = reqwest::multipart::Part::text("x")
            .mime_str("not a mime type")
            .expect_err("bad mime");
        assert!(err.is_builder());
        assert!(matches!(
            ClientError::from(err),
            ClientError::ValidationFailed(_)
        ));
    }

    #[test]
    fn api_codes_map_to_variants() {
        let err = ClientError::from(ApiError::new(ErrorCode::NotFound, "tender 9 not found"));
        assert_eq!(err.to_string(), "tender 9 not found");
        assert_eq!(
            ClientError::from(ApiError::new(ErrorCode::InvalidCredentials, "nope")),
            ClientError::InvalidCredentials
        );
    }
}
