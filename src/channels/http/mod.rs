use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use reqwest::{
    Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    channels::Channel,
    channels::http::state::{HTTPState, ThreadStore},
    config::{HTTPChannelConfig, UpstreamConfig},
};

pub mod models;

mod api;
pub mod state;

pub fn router(state: HTTPState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    Router::new()
        .route("/api/v1/ping", get(api::v1::ping))
        .route("/api/v1/chat", post(api::v1::chat::chat))
        .route("/api/v1/validate-key", get(api::v1::validate::validate_key))
        .layer(cors)
        .with_state(state)
}

pub struct HTTPChannel {
    config: HTTPChannelConfig,
    upstream: UpstreamConfig,
}

impl HTTPChannel {
    pub fn new(config: HTTPChannelConfig, upstream: UpstreamConfig) -> Result<Self> {
        Ok(Self { config, upstream })
    }
}

impl Channel for HTTPChannel {
    async fn run(&mut self) -> Result<()> {
        let app = router(HTTPState {
            upstream: self.upstream.clone(),
            threads: ThreadStore::new(),
        });

        let listener =
            tokio::net::TcpListener::bind(format!("0.0.0.0:{}", self.config.port)).await?;

        log::info!("http listening on port {}", self.config.port);
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn relay_router(base_url: String, threads: ThreadStore) -> Router {
        router(HTTPState {
            upstream: UpstreamConfig {
                base_url,
                model: "gpt-4o-mini".into(),
                preamble: String::new(),
            },
            threads,
        })
    }

    fn test_router() -> Router {
        relay_router("http://localhost:1".into(), ThreadStore::new())
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// One-shot upstream double. Advertising more bytes than the parts hold
    /// makes the connection drop read as a mid-stream failure.
    async fn stub_upstream(advertised: usize, parts: Vec<Vec<u8>>) -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;

            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\n\r\n",
                advertised
            );
            socket.write_all(head.as_bytes()).await.unwrap();

            for part in parts {
                socket.write_all(&part).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        });

        format!("http://{}", addr)
    }

    fn chat_request(body: &'static str) -> Request<Body> {
        Request::post("/api/v1/chat")
            .header(header::AUTHORIZATION, "Bearer sk-test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn ping_pongs() {
        let response = test_router()
            .oneshot(Request::get("/api/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["data"], "pong");
    }

    #[tokio::test]
    async fn chat_without_credential_is_401() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "API key is required");
    }

    #[tokio::test]
    async fn chat_without_message_is_400() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/chat")
                    .header(header::AUTHORIZATION, "Bearer sk-test")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_message_list_is_400() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/chat")
                    .header(header::AUTHORIZATION, "Bearer sk-test")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"messages":[],"message":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_streams_header_line_then_deltas() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"世\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"界!\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let bytes = sse.as_bytes();
        // split one byte into the three-byte character
        let split = sse.find('世').unwrap() + 1;
        let base_url = stub_upstream(
            bytes.len(),
            vec![bytes[..split].to_vec(), bytes[split..].to_vec()],
        )
        .await;

        let threads = ThreadStore::new();
        let response = relay_router(base_url, threads.clone())
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let (header_line, content) = text.split_once('\n').unwrap();
        let header: serde_json::Value = serde_json::from_str(header_line).unwrap();
        let thread_id = header["threadId"].as_str().unwrap().to_string();
        assert!(!thread_id.is_empty());
        assert_eq!(content, "世界!");

        // recorded on clean end: the user turn and the full reply
        let (_, history) = threads.resolve(Some(thread_id)).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "世界!");
    }

    #[tokio::test]
    async fn tool_call_start_renders_a_banner() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"id\":\"call_1\",\"function\":{\"name\":\"run_code\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let base_url = stub_upstream(sse.len(), vec![sse.as_bytes().to_vec()]).await;

        let threads = ThreadStore::new();
        let response = relay_router(base_url, threads.clone())
            .oneshot(chat_request(r#"{"message":"run it"}"#))
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let (header_line, content) = text.split_once('\n').unwrap();
        let header: serde_json::Value = serde_json::from_str(header_line).unwrap();
        assert_eq!(content, "\nassistant > run_code\n\n");

        // nothing but the banner streamed, so no assistant reply is recorded
        let thread_id = header["threadId"].as_str().unwrap().to_string();
        let (_, history) = threads.resolve(Some(thread_id)).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "run it");
    }

    #[tokio::test]
    async fn mid_stream_failure_aborts_without_recording_a_reply() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n";
        // advertise more bytes than will ever arrive, then drop the connection
        let base_url = stub_upstream(sse.len() + 64, vec![sse.as_bytes().to_vec()]).await;

        let threads = ThreadStore::new();
        let response = relay_router(base_url, threads.clone())
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let mut text = String::new();
        let mut saw_error = false;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Some(data) = frame.data_ref() {
                        text.push_str(std::str::from_utf8(data).unwrap());
                    }
                }
                Err(_) => {
                    saw_error = true;
                    break;
                }
            }
        }
        assert!(saw_error);

        let (header_line, content) = text.split_once('\n').unwrap();
        let header: serde_json::Value = serde_json::from_str(header_line).unwrap();
        assert_eq!(content, "Hel");

        // abnormal end: only the user turn is recorded
        let thread_id = header["threadId"].as_str().unwrap().to_string();
        let (_, history) = threads.resolve(Some(thread_id)).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn validate_key_without_credential_is_401() {
        let response = test_router()
            .oneshot(
                Request::get("/api/v1/validate-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
