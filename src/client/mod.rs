use crate::{
    channels::http::models::chat::{ChatRequest, ValidateResponse},
    error::ChatError,
};

pub mod credentials;
pub mod message;
pub mod reader;

use reader::TransportReader;

/// One in-flight streaming reply. Owned exclusively by the caller that sent
/// the request; dropping it releases the underlying connection.
pub struct StreamSession {
    pub thread_id: String,
    pub reader: TransportReader,
}

/// Client for the relay's HTTP API, the Rust counterpart of the web UI's
/// fetch layer. The credential is always passed in, never read from storage
/// here.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a chat request and return the streaming session. Error bodies
    /// are decoded back into the matching taxonomy variant.
    pub async fn send_message(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<StreamSession, ChatError> {
        let response = self
            .client
            .post(format!("{}/api/v1/chat", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("failed to send message: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("http error {}", status.as_u16()));
            return Err(ChatError::from_status(status, message));
        }

        let mut reader = TransportReader::from_response(response);
        let header = reader.read_header().await?;

        Ok(StreamSession {
            thread_id: header.thread_id,
            reader,
        })
    }

    /// Boolean credential check. Any failure counts as invalid; the cause is
    /// logged, matching the web client's behavior.
    pub async fn validate_api_key(&self, api_key: &str) -> bool {
        match self.try_validate(api_key).await {
            Ok(valid) => valid,
            Err(err) => {
                log::error!("error validating api key: {}", err);
                false
            }
        }
    }

    async fn try_validate(&self, api_key: &str) -> Result<bool, ChatError> {
        let response = self
            .client
            .get(format!("{}/api/v1/validate-key", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("failed to validate key: {}", err)))?;

        let body = response
            .json::<ValidateResponse>()
            .await
            .map_err(|err| ChatError::Transport(format!("malformed validation reply: {}", err)))?;

        Ok(body.valid)
    }
}
