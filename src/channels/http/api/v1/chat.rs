use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, header},
    response::Response,
};
use bytes::Bytes;
use futures::{StreamExt, stream};

use crate::{
    channels::http::{
        models::chat::{ChatRequest, StreamHeader},
        state::HTTPState,
    },
    error::ChatError,
    upstream::{UpstreamClient, request::Message, response::UpstreamEvent},
};

pub fn bearer_token(headers: &HeaderMap) -> Result<String, ChatError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(' ').nth(1))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ChatError::Auth("API key is required".into()))
}

/// POST /api/v1/chat
///
/// Forwards one upstream completion call and streams its deltas back as a
/// `text/plain` chunked body, prefixed with one `{"threadId":"..."}` line.
/// Each upstream event maps to exactly one forwarded unit, in order.
pub async fn chat(
    State(state): State<HTTPState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ChatError> {
    let api_key = bearer_token(&headers)?;

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.upstream.model.clone());
    if model.is_empty() {
        return Err(ChatError::Validation("missing required parameters".into()));
    }

    // `messages` takes the caller's history verbatim; `message` continues a
    // server-held thread and records the exchange on clean end
    let (thread_id, history, record_reply) = match (&request.messages, &request.message) {
        (Some(messages), _) if !messages.is_empty() => {
            let (thread_id, _) = state.threads.resolve(request.thread_id.clone()).await;
            (thread_id, messages.clone(), false)
        }
        (_, Some(message)) if !message.trim().is_empty() => {
            let (thread_id, mut history) = state.threads.resolve(request.thread_id.clone()).await;
            let user = Message::user(message.clone());
            state.threads.append(&thread_id, user.clone()).await;
            history.push(user);
            (thread_id, history, true)
        }
        _ => return Err(ChatError::Validation("missing required parameters".into())),
    };

    let mut messages = Vec::with_capacity(history.len() + 1);
    if !state.upstream.preamble.is_empty() {
        messages.push(Message::system(state.upstream.preamble.clone()));
    }
    messages.extend(history);

    let upstream = UpstreamClient::new(state.upstream.base_url.clone(), api_key);
    let mut events = upstream.chat_stream(model, messages);

    // a failure before the first delta is a plain error response, not a
    // half-open stream
    let first = events.next().await;
    if let Some(Err(err)) = first {
        return Err(err);
    }
    let mut events = stream::iter(first).chain(events);

    let threads = state.threads.clone();
    let thread_id_for_body = thread_id.clone();

    let body_stream = async_stream::stream! {
        let header = StreamHeader { thread_id: thread_id_for_body.clone() };
        let line = serde_json::to_string(&header).unwrap() + "\n";
        yield Ok::<Bytes, std::io::Error>(Bytes::from(line));

        let mut reply = String::new();

        while let Some(event) = events.next().await {
            match event {
                Ok(UpstreamEvent::TextDelta(text)) => {
                    reply.push_str(&text);
                    yield Ok(Bytes::from(text));
                }
                Ok(UpstreamEvent::ToolCallStarted(name)) => {
                    yield Ok(Bytes::from(format!("\nassistant > {}\n\n", name)));
                }
                Ok(UpstreamEvent::ToolCallDelta(fragment)) => {
                    reply.push_str(&fragment);
                    yield Ok(Bytes::from(fragment));
                }
                Ok(UpstreamEvent::End) => {
                    if record_reply && !reply.is_empty() {
                        threads
                            .append(&thread_id_for_body, Message::assistant(reply.clone()))
                            .await;
                    }
                    return;
                }
                Err(err) => {
                    // abort with an explicit error, never a silent truncation
                    log::error!("upstream stream error: {}", err);
                    yield Err(std::io::Error::other(err.to_string()));
                    return;
                }
            }
        }
    };

    log::debug!("streaming reply for thread {}", thread_id);

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .map_err(|err| ChatError::Internal(err.to_string()))
}
