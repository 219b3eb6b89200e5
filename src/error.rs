use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Error taxonomy for the relay and client pipeline.
///
/// Extraction is deliberately absent: scanning a frozen message never fails,
/// it just yields an empty set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    /// Missing or rejected credential.
    #[error("{0}")]
    Auth(String),

    /// Missing required request fields.
    #[error("{0}")]
    Validation(String),

    /// The model provider rejected or failed the request.
    #[error("{0}")]
    Upstream(String),

    /// Stream read failure, decode failure, or malformed header line.
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Internal(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Transport(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuild the taxonomy variant from a relay error response, so callers
    /// can tell "prompt for a new key" apart from "suggest retrying".
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(message),
            StatusCode::BAD_REQUEST => Self::Validation(message),
            StatusCode::BAD_GATEWAY => Self::Upstream(message),
            _ => Self::Internal(message),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        log::error!("{}", self);
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ChatError::Auth("no key".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ChatError::Validation("missing".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::Upstream("rejected".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ChatError::Transport("eof".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn round_trips_through_status() {
        let err = ChatError::from_status(StatusCode::UNAUTHORIZED, "API key is required".into());
        assert!(matches!(err, ChatError::Auth(_)));

        let err = ChatError::from_status(StatusCode::BAD_REQUEST, "missing".into());
        assert!(matches!(err, ChatError::Validation(_)));

        let err = ChatError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(matches!(err, ChatError::Internal(_)));
    }
}
