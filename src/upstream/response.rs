use serde::Deserialize;

/// One upstream occurrence, in the exact order produced. Errors travel on
/// the `Err` side of the event stream, so they are not a variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    TextDelta(String),
    ToolCallStarted(String),
    ToolCallDelta(String),
    End,
}

#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

/// Map one SSE `data:` payload to its ordered events. Unparseable payloads
/// yield nothing; the stream carries on.
pub fn parse_sse_data(data: &str) -> Vec<UpstreamEvent> {
    if data.trim() == "[DONE]" {
        return vec![UpstreamEvent::End];
    }

    let Ok(parsed) = serde_json::from_str::<StreamResponse>(data) else {
        return vec![];
    };

    let mut events = Vec::new();
    for choice in parsed.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(UpstreamEvent::TextDelta(content));
            }
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            for chunk in tool_calls {
                // an id marks the opening chunk of a tool call
                if chunk.id.is_some() {
                    let name = chunk
                        .function
                        .as_ref()
                        .and_then(|f| f.name.clone())
                        .or(chunk.r#type)
                        .unwrap_or_else(|| "function".into());
                    events.push(UpstreamEvent::ToolCallStarted(name));
                }

                if let Some(arguments) = chunk.function.and_then(|f| f.arguments) {
                    if !arguments.is_empty() {
                        events.push(UpstreamEvent::ToolCallDelta(arguments));
                    }
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_marker_ends_the_stream() {
        assert_eq!(parse_sse_data("[DONE]"), vec![UpstreamEvent::End]);
        assert_eq!(parse_sse_data(" [DONE] "), vec![UpstreamEvent::End]);
    }

    #[test]
    fn content_delta_becomes_text_event() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_sse_data(data),
            vec![UpstreamEvent::TextDelta("Hello".into())]
        );
    }

    #[test]
    fn empty_delta_yields_nothing() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(parse_sse_data(data).is_empty());
    }

    #[test]
    fn tool_call_opening_chunk() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"id":"call_1","type":"function","function":{"name":"run_code","arguments":""}}]}}]}"#;
        assert_eq!(
            parse_sse_data(data),
            vec![UpstreamEvent::ToolCallStarted("run_code".into())]
        );
    }

    #[test]
    fn tool_call_argument_fragments() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"function":{"arguments":"{\"x\":"}}]}}]}"#;
        assert_eq!(
            parse_sse_data(data),
            vec![UpstreamEvent::ToolCallDelta("{\"x\":".into())]
        );
    }

    #[test]
    fn garbage_payload_is_skipped() {
        assert!(parse_sse_data("not json").is_empty());
    }
}
