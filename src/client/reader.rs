use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::channels::http::models::chat::StreamHeader;
use crate::error::ChatError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Pull-based reader over a streamed response body.
///
/// Decodes bytes to text incrementally; a multi-byte character split across
/// chunk boundaries is carried until its remaining bytes arrive. Zero-length
/// chunks are skipped, never treated as end-of-stream. End is signaled
/// exactly once, after which every read returns `None`.
pub struct TransportReader {
    source: ByteStream,
    // undecoded tail bytes, always a strict prefix of one utf-8 sequence
    carry: Vec<u8>,
    // decoded text put back after header splitting, replayed first
    pending: Option<String>,
    done: bool,
}

impl TransportReader {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source,
            carry: Vec::new(),
            pending: None,
            done: false,
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| ChatError::Transport(format!("stream read error: {}", err))));

        Self::new(Box::pin(stream))
    }

    /// Next decoded fragment, or `None` at end-of-stream.
    pub async fn read(&mut self) -> Result<Option<String>, ChatError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }

        if self.done {
            return Ok(None);
        }

        loop {
            let Some(chunk) = self.source.next().await else {
                self.done = true;
                if !self.carry.is_empty() {
                    return Err(ChatError::Transport(
                        "stream ended inside a multi-byte character".into(),
                    ));
                }
                return Ok(None);
            };

            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            };

            if bytes.is_empty() {
                continue;
            }

            self.carry.extend_from_slice(&bytes);
            if let Some(text) = self.decode_ready()? {
                return Ok(Some(text));
            }
            // everything so far is an incomplete tail, pull again
        }
    }

    /// Consume bytes up to and including the first newline and parse them as
    /// the session header. The remainder of that chunk stays queued for
    /// `read`, so no content byte is lost or duplicated. Failing before the
    /// newline is fatal: a reassembled message must not silently miss its
    /// session identifier.
    pub async fn read_header(&mut self) -> Result<StreamHeader, ChatError> {
        let mut line = String::new();

        loop {
            let Some(fragment) = self.read().await? else {
                self.done = true;
                return Err(ChatError::Transport(
                    "stream ended before the header line".into(),
                ));
            };

            match fragment.find('\n') {
                Some(pos) => {
                    line.push_str(&fragment[..pos]);
                    let rest = &fragment[pos + 1..];
                    if !rest.is_empty() {
                        self.pending = Some(rest.to_string());
                    }
                    break;
                }
                None => line.push_str(&fragment),
            }
        }

        serde_json::from_str(&line)
            .map_err(|err| ChatError::Transport(format!("malformed header line: {}", err)))
    }

    fn decode_ready(&mut self) -> Result<Option<String>, ChatError> {
        match std::str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_string();
                self.carry.clear();
                Ok(Some(text))
            }
            // error_len() == None means the buffer ends inside a valid
            // sequence; keep the tail and emit the decoded prefix
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                if valid == 0 {
                    return Ok(None);
                }
                let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
                self.carry.drain(..valid);
                Ok(Some(text))
            }
            Err(_) => {
                self.done = true;
                Err(ChatError::Transport("invalid utf-8 in stream".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn reader_over(chunks: Vec<&[u8]>) -> TransportReader {
        let chunks: Vec<Result<Bytes, ChatError>> = chunks
            .into_iter()
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        TransportReader::new(Box::pin(stream::iter(chunks)))
    }

    async fn drain(reader: &mut TransportReader) -> String {
        let mut out = String::new();
        while let Some(fragment) = reader.read().await.unwrap() {
            out.push_str(&fragment);
        }
        out
    }

    #[tokio::test]
    async fn concatenation_round_trips() {
        let mut reader = reader_over(vec![b"Hel", b"lo ", b"world"]);
        assert_eq!(drain(&mut reader).await, "Hello world");
    }

    #[tokio::test]
    async fn end_is_signaled_exactly_once() {
        let mut reader = reader_over(vec![b"done"]);
        assert_eq!(reader.read().await.unwrap(), Some("done".into()));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_length_chunks_are_not_end_of_stream() {
        let mut reader = reader_over(vec![b"a", b"", b"b"]);
        assert_eq!(drain(&mut reader).await, "ab");
    }

    #[tokio::test]
    async fn multibyte_split_across_chunks() {
        // "héllo 世界" with splits inside both é and 世
        let text = "héllo 世界";
        let bytes = text.as_bytes();
        let mut reader = reader_over(vec![&bytes[..2], &bytes[2..9], &bytes[9..]]);
        assert_eq!(drain(&mut reader).await, text);
    }

    #[tokio::test]
    async fn every_single_byte_split_round_trips() {
        let text = "naïve 日本語 🎉 end";
        let chunks: Vec<&[u8]> = text.as_bytes().chunks(1).collect();
        let mut reader = reader_over(chunks);
        assert_eq!(drain(&mut reader).await, text);
    }

    #[tokio::test]
    async fn truncated_multibyte_tail_is_an_error() {
        let bytes = "é".as_bytes();
        let mut reader = reader_over(vec![&bytes[..1]]);
        assert!(reader.read().await.is_err());
    }

    #[tokio::test]
    async fn header_split_from_same_chunk() {
        let mut reader = reader_over(vec![b"{\"threadId\":\"T1\"}\nHello"]);
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.thread_id, "T1");
        assert_eq!(drain(&mut reader).await, "Hello");
    }

    #[tokio::test]
    async fn header_split_across_chunks() {
        let mut reader = reader_over(vec![b"{\"threadId\":", b"\"T2\"}", b"\nHe", b"llo"]);
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.thread_id, "T2");
        assert_eq!(drain(&mut reader).await, "Hello");
    }

    #[tokio::test]
    async fn header_only_body_yields_empty_content() {
        let mut reader = reader_over(vec![b"{\"threadId\":\"T3\"}\n"]);
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.thread_id, "T3");
        assert_eq!(drain(&mut reader).await, "");
    }

    #[tokio::test]
    async fn eof_before_header_newline_is_fatal() {
        let mut reader = reader_over(vec![b"{\"threadId\":\"T4\"}"]);
        assert!(reader.read_header().await.is_err());
    }

    #[tokio::test]
    async fn malformed_header_line_is_fatal() {
        let mut reader = reader_over(vec![b"not json\ncontent"]);
        assert!(reader.read_header().await.is_err());
    }

    #[tokio::test]
    async fn transport_error_before_header_is_fatal() {
        let chunks: Vec<Result<Bytes, ChatError>> =
            vec![Err(ChatError::Transport("connection reset".into()))];
        let mut reader = TransportReader::new(Box::pin(stream::iter(chunks)));
        assert!(reader.read_header().await.is_err());
        // no further reads after a fatal error
        assert_eq!(reader.read().await.unwrap(), None);
    }
}
