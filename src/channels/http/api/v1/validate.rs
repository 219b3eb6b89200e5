use axum::{Json, extract::State, http::HeaderMap};
use reqwest::StatusCode;

use crate::{
    channels::http::{api::v1::chat::bearer_token, models::chat::ValidateResponse, state::HTTPState},
    error::ChatError,
    upstream::UpstreamClient,
};

/// GET /api/v1/validate-key
///
/// One cheap read-only upstream call (list models). An upstream rejection
/// maps to 401 with `valid: false`; a network/server fault stays a plain
/// server error so the caller can tell the two apart.
pub async fn validate_key(
    State(state): State<HTTPState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ValidateResponse>), ChatError> {
    let api_key = bearer_token(&headers)?;

    let upstream = UpstreamClient::new(state.upstream.base_url.clone(), api_key);
    match upstream.list_models().await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(ValidateResponse {
                valid: true,
                error: None,
            }),
        )),
        Err(ChatError::Auth(_)) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(ValidateResponse {
                valid: false,
                error: Some("Invalid API key".into()),
            }),
        )),
        Err(err) => Err(err),
    }
}
