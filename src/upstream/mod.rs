use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::StatusCode;

use crate::error::ChatError;

pub mod request;
pub mod response;

use request::{ChatCompletionRequest, Message};
use response::UpstreamEvent;

/// Ordered sequence of typed upstream events. Terminates after `End` (clean)
/// or after the first `Err` (abnormal, remaining output discarded).
pub type EventStream = Pin<Box<dyn Stream<Item = Result<UpstreamEvent, ChatError>> + Send>>;

/// Streaming client for an OpenAI-compatible completion API. Built per
/// request around the caller's credential; never retries on its own.
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Open a streaming completion call and surface each upstream delta the
    /// moment it arrives, in order, without buffering the whole reply.
    pub fn chat_stream(&self, model: String, messages: Vec<Message>) -> EventStream {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/chat/completions", self.base_url);

        Box::pin(async_stream::stream! {
            let body = ChatCompletionRequest {
                model,
                messages,
                stream: true,
            };

            let response = match client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    yield Err(ChatError::Transport(format!("upstream request failed: {}", err)));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                yield Err(classify_upstream(status, &text));
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut carry: Vec<u8> = Vec::new();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        yield Err(ChatError::Transport(format!("stream read error: {}", err)));
                        return;
                    }
                };

                match decode_carried(&mut carry, &bytes) {
                    Ok(text) => buffer.push_str(&text),
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }

                // process complete SSE lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if let Some(data) = line.strip_prefix("data: ") {
                        for event in response::parse_sse_data(data) {
                            let done = event == UpstreamEvent::End;
                            yield Ok(event);
                            if done {
                                return;
                            }
                        }
                    }
                }
            }

            if !carry.is_empty() {
                yield Err(ChatError::Transport(
                    "upstream stream ended inside a multi-byte character".into(),
                ));
                return;
            }

            // upstream closed without a [DONE] marker; still a clean end
            yield Ok(UpstreamEvent::End);
        })
    }

    /// Single cheap read-only call backing credential validation. An
    /// upstream 401/403 means "credential rejected"; anything else that
    /// fails is a network/server fault.
    pub async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("upstream request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(status, &text));
        }

        let models = response
            .json::<response::ModelList>()
            .await
            .map_err(|err| ChatError::Upstream(format!("malformed model list: {}", err)))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

/// Decode `bytes` together with the undecoded tail of the previous chunk.
/// A multi-byte character split across chunk boundaries stays in `carry`
/// until its remaining bytes arrive, so deltas come out verbatim.
fn decode_carried(carry: &mut Vec<u8>, bytes: &[u8]) -> Result<String, ChatError> {
    carry.extend_from_slice(bytes);

    match std::str::from_utf8(carry) {
        Ok(text) => {
            let text = text.to_string();
            carry.clear();
            Ok(text)
        }
        Err(err) if err.error_len().is_none() => {
            let valid = err.valid_up_to();
            let text = String::from_utf8_lossy(&carry[..valid]).into_owned();
            carry.drain(..valid);
            Ok(text)
        }
        Err(_) => Err(ChatError::Transport(
            "invalid utf-8 in upstream stream".into(),
        )),
    }
}

fn classify_upstream(status: StatusCode, body: &str) -> ChatError {
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("upstream error {}", status.as_u16())
    } else {
        format!("upstream error {}: {}", status.as_u16(), detail)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(message),
        _ => ChatError::Upstream(message),
    }
}
